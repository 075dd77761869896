//! Command-line interface

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "gmail-priority")]
#[command(version)]
#[command(about = "Rank important unread Gmail messages by priority", long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    /// Override the OAuth2 credentials file from the config
    #[arg(long)]
    pub credentials: Option<PathBuf>,

    /// Override the session file from the config
    #[arg(long)]
    pub session_file: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show sign-in state and the last ranked list
    Status,

    /// Sign in with Google, forcing a fresh grant
    SignIn,

    /// Revoke the token and clear the local session
    SignOut,

    /// Fetch important unread mail and rank it by priority
    Sort,

    /// Mark one message as read and drop it from the list
    Read {
        /// Message ID as shown in the list
        id: String,
    },

    /// Walk the ranked list and mark messages read interactively
    Review,

    /// Generate example configuration file
    InitConfig {
        /// Path to create config file
        #[arg(short, long, default_value = "config.toml")]
        output: PathBuf,

        /// Overwrite existing file
        #[arg(long)]
        force: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_read_command() {
        let cli = Cli::parse_from(["gmail-priority", "--verbose", "read", "18c2f0a1"]);
        assert!(cli.verbose);
        assert_eq!(cli.config, PathBuf::from("config.toml"));
        match cli.command {
            Commands::Read { id } => assert_eq!(id, "18c2f0a1"),
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_overrides() {
        let cli = Cli::parse_from([
            "gmail-priority",
            "--config",
            "alt.toml",
            "--session-file",
            "/tmp/s.json",
            "sign-out",
        ]);
        assert_eq!(cli.config, PathBuf::from("alt.toml"));
        assert_eq!(cli.session_file, Some(PathBuf::from("/tmp/s.json")));
        assert!(matches!(cli.command, Commands::SignOut));
    }

    #[test]
    fn test_parse_init_config_defaults() {
        let cli = Cli::parse_from(["gmail-priority", "init-config"]);
        match cli.command {
            Commands::InitConfig { output, force } => {
                assert_eq!(output, PathBuf::from("config.toml"));
                assert!(!force);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}
