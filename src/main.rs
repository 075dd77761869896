use anyhow::Result;
use clap::Parser;
use gmail_priority::app::{Popup, Services};
use gmail_priority::cli::{Cli, Commands};
use gmail_priority::config::Config;
use gmail_priority::error::PriorityError;
use gmail_priority::render::ConsoleRenderer;
use gmail_priority::store::CredentialStore;
use indicatif::MultiProgress;
use std::io::Write;
use std::process;
use std::sync::{Arc, Mutex};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::EnvFilter;

/// A writer that prints through MultiProgress to avoid tearing the spinner
#[derive(Clone)]
struct MultiProgressWriter {
    multi: MultiProgress,
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl MultiProgressWriter {
    fn new(multi: MultiProgress) -> Self {
        Self {
            multi,
            buffer: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl Write for MultiProgressWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let mut buffer = self.buffer.lock().unwrap_or_else(|e| e.into_inner());
        buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        let mut buffer = self.buffer.lock().unwrap_or_else(|e| e.into_inner());
        if !buffer.is_empty() {
            let msg = String::from_utf8_lossy(&buffer);
            let msg = msg.trim_end_matches('\n');
            if !msg.is_empty() {
                let _ = self.multi.println(msg);
            }
            buffer.clear();
        }
        Ok(())
    }
}

impl Drop for MultiProgressWriter {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}

/// MakeWriter implementation for tracing
#[derive(Clone)]
struct MultiProgressMakeWriter {
    multi: MultiProgress,
}

impl<'a> MakeWriter<'a> for MultiProgressMakeWriter {
    type Writer = MultiProgressWriter;

    fn make_writer(&'a self) -> Self::Writer {
        MultiProgressWriter::new(self.multi.clone())
    }
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        tracing::error!("{:#}", e);
        eprintln!("Error: {}", e);
        hint(&e);
        process::exit(1);
    }
}

async fn run() -> Result<()> {
    gmail_priority::http::install_crypto_provider();

    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("gmail_priority=debug,info"))
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("gmail_priority=info,warn"))
    };

    // Logs and the busy spinner share one MultiProgress so lines print above it
    let multi = MultiProgress::new();
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(MultiProgressMakeWriter {
            multi: multi.clone(),
        })
        .with_target(false)
        .with_thread_ids(false)
        .init();

    if let Commands::InitConfig { output, force } = &cli.command {
        if output.exists() && !force {
            return Err(PriorityError::ConfigError(format!(
                "Configuration file already exists at {:?}. Use --force to overwrite.",
                output
            ))
            .into());
        }
        Config::create_example(output).await?;
        println!("Created example configuration file at: {:?}", output);
        return Ok(());
    }

    let mut config = Config::load(&cli.config).await?;
    if let Some(credentials) = &cli.credentials {
        config.auth.credentials = credentials.clone();
    }
    if let Some(session_file) = &cli.session_file {
        config.storage.path = session_file.clone();
    }

    let store = Arc::new(CredentialStore::open(&config.storage.path).await?);
    let renderer = Arc::new(ConsoleRenderer::new(multi));
    let services = Services::from_config(&config)?;
    let popup = Popup::new(&config, services, store, renderer);

    match cli.command {
        Commands::Status => {
            popup.on_load().await;
        }

        Commands::SignIn => {
            popup.on_sign_in().await?;
        }

        Commands::SignOut => {
            popup.on_sign_out().await?;
        }

        Commands::Sort => {
            if !popup.is_signed_in().await {
                return Err(PriorityError::NotSignedIn.into());
            }
            popup.on_sort().await?;
        }

        Commands::Read { id } => {
            popup.on_mark_read(&id).await?;
        }

        Commands::Review => {
            if !popup.is_signed_in().await {
                return Err(PriorityError::NotSignedIn.into());
            }
            let marked = gmail_priority::interactive::run_review(&popup).await?;
            println!("Marked {} message(s) as read", marked);
        }

        Commands::InitConfig { .. } => {}
    }

    Ok(())
}

/// Print a follow-up suggestion for errors the user can act on
fn hint(error: &anyhow::Error) {
    if let Some(priority_err) = error.downcast_ref::<PriorityError>() {
        match priority_err {
            PriorityError::NotSignedIn => {
                eprintln!("\nHint: run `gmail-priority sign-in` first.");
            }
            PriorityError::AuthError(_) => {
                eprintln!("\nHint: make sure your credentials.json file is valid.");
                eprintln!("      You can download it from Google Cloud Console.");
            }
            PriorityError::NoResults => {
                eprintln!("\nNo important unread messages right now; the saved list is unchanged.");
            }
            PriorityError::RankParseError(_) => {
                eprintln!("\nThe ranking service answered unusably; the saved list is unchanged.");
            }
            PriorityError::ConfigError(_) => {
                eprintln!("\nHint: check your configuration file.");
                eprintln!("      Run: gmail-priority init-config --force");
            }
            _ => {}
        }
    }
}
