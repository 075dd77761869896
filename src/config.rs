use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{PriorityError, Result};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub mail: MailConfig,
    #[serde(default)]
    pub ranking: RankingConfig,
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default = "default_credentials")]
    pub credentials: PathBuf,
    #[serde(default = "default_token_cache")]
    pub token_cache: PathBuf,
    #[serde(default = "default_revoke_url")]
    pub revoke_url: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            credentials: default_credentials(),
            token_cache: default_token_cache(),
            revoke_url: default_revoke_url(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailConfig {
    #[serde(default = "default_query")]
    pub query: String,
    #[serde(default = "default_max_results")]
    pub max_results: u32,
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_requests: usize,
    /// Overrides the Gmail API base URL, e.g. `http://127.0.0.1:8080/gmail/v1/`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            query: default_query(),
            max_results: default_max_results(),
            max_concurrent_requests: default_max_concurrent(),
            base_url: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankingConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Environment variable holding the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    /// The endpoint is a server-side proxy that attaches its own credential
    #[serde(default)]
    pub proxy: bool,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            model: default_model(),
            max_tokens: default_max_tokens(),
            api_key_env: default_api_key_env(),
            proxy: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl NetworkConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_storage_path")]
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_storage_path(),
        }
    }
}

fn default_credentials() -> PathBuf {
    PathBuf::from("credentials.json")
}

fn default_token_cache() -> PathBuf {
    PathBuf::from(".gmail-priority/token.json")
}

fn default_revoke_url() -> String {
    "https://accounts.google.com/o/oauth2/revoke".to_string()
}

fn default_query() -> String {
    "is:important is:unread".to_string()
}

fn default_max_results() -> u32 {
    15
}

fn default_max_concurrent() -> usize {
    15
}

fn default_endpoint() -> String {
    "https://api.openai.com/v1/chat/completions".to_string()
}

fn default_model() -> String {
    "gpt-3.5-turbo".to_string()
}

fn default_max_tokens() -> u32 {
    500
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_storage_path() -> PathBuf {
    PathBuf::from(".gmail-priority/session.json")
}

impl Config {
    pub async fn load(path: &Path) -> Result<Self> {
        // If file doesn't exist, return default config with warning
        if !path.exists() {
            tracing::warn!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| PriorityError::ConfigError(format!("Failed to read config file: {}", e)))?;

        let config: Self = toml::from_str(&content).map_err(|e| {
            PriorityError::ConfigError(format!("Failed to parse config file: {}", e))
        })?;

        config.validate()?;

        tracing::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    pub async fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                PriorityError::ConfigError(format!("Failed to create config directory: {}", e))
            })?;
        }

        let content = toml::to_string_pretty(self).map_err(|e| {
            PriorityError::ConfigError(format!("Failed to serialize config: {}", e))
        })?;

        tokio::fs::write(path, content).await.map_err(|e| {
            PriorityError::ConfigError(format!("Failed to write config file: {}", e))
        })?;

        tracing::info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        validate_url("auth.revoke_url", &self.auth.revoke_url)?;

        if self.mail.query.trim().is_empty() {
            return Err(PriorityError::ConfigError(
                "mail.query cannot be empty".to_string(),
            ));
        }

        // Gmail caps messages.list pages at 500
        if self.mail.max_results == 0 {
            return Err(PriorityError::ConfigError(
                "mail.max_results must be at least 1".to_string(),
            ));
        }
        if self.mail.max_results > 500 {
            return Err(PriorityError::ConfigError(
                "mail.max_results cannot exceed 500".to_string(),
            ));
        }

        if self.mail.max_concurrent_requests == 0 {
            return Err(PriorityError::ConfigError(
                "mail.max_concurrent_requests must be at least 1".to_string(),
            ));
        }
        if self.mail.max_concurrent_requests > 50 {
            return Err(PriorityError::ConfigError(
                "mail.max_concurrent_requests cannot exceed 50".to_string(),
            ));
        }

        if let Some(base_url) = &self.mail.base_url {
            validate_url("mail.base_url", base_url)?;
            if !base_url.ends_with('/') {
                return Err(PriorityError::ConfigError(
                    "mail.base_url must end with '/'".to_string(),
                ));
            }
        }

        validate_url("ranking.endpoint", &self.ranking.endpoint)?;

        if self.ranking.model.trim().is_empty() {
            return Err(PriorityError::ConfigError(
                "ranking.model cannot be empty".to_string(),
            ));
        }
        if self.ranking.max_tokens == 0 {
            return Err(PriorityError::ConfigError(
                "ranking.max_tokens must be greater than 0".to_string(),
            ));
        }
        if !self.ranking.proxy && self.ranking.api_key_env.trim().is_empty() {
            return Err(PriorityError::ConfigError(
                "ranking.api_key_env cannot be empty unless ranking.proxy is set".to_string(),
            ));
        }

        if self.network.request_timeout_secs == 0 {
            return Err(PriorityError::ConfigError(
                "network.request_timeout_secs must be greater than 0".to_string(),
            ));
        }

        tracing::debug!("Configuration validation passed");
        Ok(())
    }

    /// Create an example configuration file
    pub async fn create_example(path: &Path) -> Result<()> {
        let config = Self::default();
        config.save(path).await
    }
}

fn validate_url(field: &str, value: &str) -> Result<()> {
    let parsed = url::Url::parse(value)
        .map_err(|e| PriorityError::ConfigError(format!("{} is not a valid URL: {}", field, e)))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(PriorityError::ConfigError(format!(
            "{} must use http or https, got '{}'",
            field, other
        ))),
    }
}
