//! OAuth2 session lifecycle: sign-in, sign-out and status

use async_trait::async_trait;
use google_gmail1::yup_oauth2;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use yup_oauth2::ApplicationSecret;

use crate::error::{PriorityError, Result};
use crate::http::HttpTransport;
use crate::models::{redact_token, SessionStatus};
use crate::render::Renderer;
use crate::store::CredentialStore;

/// Gmail API scopes required to read messages and clear the UNREAD label
pub const REQUIRED_SCOPES: &[&str] = &["https://www.googleapis.com/auth/gmail.modify"];

/// Source of interactive OAuth bearer tokens
#[async_trait]
pub trait IdentityBroker: Send + Sync {
    /// Forget every token the broker has cached
    async fn clear_all_cached_tokens(&self) -> Result<()>;

    /// Obtain a token, prompting the user if `interactive` and nothing is cached
    async fn get_auth_token(&self, interactive: bool) -> Result<String>;

    /// Forget one cached token
    async fn remove_cached_token(&self, token: &str) -> Result<()>;
}

/// Remote token revocation
#[async_trait]
pub trait TokenRevoker: Send + Sync {
    async fn revoke(&self, token: &str) -> Result<()>;
}

/// Identity broker backed by the yup-oauth2 installed-app flow
///
/// Tokens are persisted to `token_cache_path`; clearing the cache removes that file.
pub struct InstalledFlowBroker {
    credentials_path: PathBuf,
    token_cache_path: PathBuf,
}

impl InstalledFlowBroker {
    pub fn new(credentials_path: impl Into<PathBuf>, token_cache_path: impl Into<PathBuf>) -> Self {
        Self {
            credentials_path: credentials_path.into(),
            token_cache_path: token_cache_path.into(),
        }
    }

    async fn application_secret(&self) -> Result<ApplicationSecret> {
        if self.credentials_path.exists() {
            return yup_oauth2::read_application_secret(&self.credentials_path)
                .await
                .map_err(|e| PriorityError::AuthError(format!("Failed to read credentials: {}", e)));
        }
        debug!(
            "No credentials file at {:?}, falling back to environment",
            self.credentials_path
        );
        load_credentials_from_env()
    }

    async fn remove_cache_file(&self) -> Result<()> {
        match tokio::fs::remove_file(&self.token_cache_path).await {
            Ok(()) => {
                debug!("Removed token cache {:?}", self.token_cache_path);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl IdentityBroker for InstalledFlowBroker {
    async fn clear_all_cached_tokens(&self) -> Result<()> {
        self.remove_cache_file().await
    }

    async fn get_auth_token(&self, interactive: bool) -> Result<String> {
        if !interactive && !self.token_cache_path.exists() {
            return Err(PriorityError::AuthError(
                "No cached token and interactive grant not allowed".to_string(),
            ));
        }

        if let Some(parent) = self.token_cache_path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let secret = self.application_secret().await?;

        // HTTPRedirect opens a browser for user authorization
        let auth = yup_oauth2::InstalledFlowAuthenticator::builder(
            secret,
            yup_oauth2::InstalledFlowReturnMethod::HTTPRedirect,
        )
        .persist_tokens_to_disk(&self.token_cache_path)
        .build()
        .await
        .map_err(|e| PriorityError::AuthError(format!("Failed to build authenticator: {}", e)))?;

        let token = auth
            .token(REQUIRED_SCOPES)
            .await
            .map_err(|e| PriorityError::AuthError(format!("Failed to obtain token: {}", e)))?;

        if self.token_cache_path.exists() {
            secure_token_file(&self.token_cache_path).await?;
        }

        token
            .token()
            .map(str::to_string)
            .ok_or_else(|| PriorityError::AuthError("Broker returned an empty token".to_string()))
    }

    async fn remove_cached_token(&self, token: &str) -> Result<()> {
        // The cache holds a single account, so dropping the file drops the token
        match tokio::fs::read_to_string(&self.token_cache_path).await {
            Ok(content) if content.contains(token) => self.remove_cache_file().await,
            Ok(_) => {
                debug!("Token {} not present in cache", redact_token(token));
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Revokes tokens by POSTing `token=<token>` to the OAuth revocation endpoint
pub struct HttpTokenRevoker {
    transport: HttpTransport,
    revoke_url: String,
}

impl HttpTokenRevoker {
    pub fn new(transport: HttpTransport, revoke_url: impl Into<String>) -> Self {
        Self {
            transport,
            revoke_url: revoke_url.into(),
        }
    }
}

#[async_trait]
impl TokenRevoker for HttpTokenRevoker {
    async fn revoke(&self, token: &str) -> Result<()> {
        let response = self
            .transport
            .post_form(&self.revoke_url, &[("token", token)])
            .await?;

        if !response.is_success() {
            return Err(PriorityError::HttpStatus {
                status: response.status.as_u16(),
                message: response.text(),
            });
        }
        Ok(())
    }
}

/// Owns the session token: the only writer of the token slot
pub struct AuthManager {
    broker: Arc<dyn IdentityBroker>,
    revoker: Arc<dyn TokenRevoker>,
    store: Arc<CredentialStore>,
    renderer: Arc<dyn Renderer>,
}

impl AuthManager {
    pub fn new(
        broker: Arc<dyn IdentityBroker>,
        revoker: Arc<dyn TokenRevoker>,
        store: Arc<CredentialStore>,
        renderer: Arc<dyn Renderer>,
    ) -> Self {
        Self {
            broker,
            revoker,
            store,
            renderer,
        }
    }

    /// Force a fresh interactive grant and store it
    ///
    /// The broker can hand back a stale cached token on the first request even
    /// right after a clear, so the first token is discarded and a second one is
    /// requested. On failure the stored session is left as it was.
    pub async fn sign_in(&self) -> Result<SessionStatus> {
        info!("Forcing sign in");

        if let Err(e) = self.broker.clear_all_cached_tokens().await {
            warn!("Failed to clear cached tokens: {}", e);
        }

        let initial = self.broker.get_auth_token(true).await.map_err(|e| {
            error!("OAuth error on initial token: {}", e);
            e
        })?;
        debug!("Initial token obtained: {}", redact_token(&initial));

        if let Err(e) = self.broker.remove_cached_token(&initial).await {
            warn!("Failed to remove initial cached token: {}", e);
        }

        let token = self.broker.get_auth_token(true).await.map_err(|e| {
            error!("OAuth error on fresh token: {}", e);
            e
        })?;
        debug!("Fresh token obtained: {}", redact_token(&token));

        self.store.set_token(token).await?;
        info!("New token stored");

        Ok(self.check_status().await)
    }

    /// Revoke (best effort) and tear down the local session
    pub async fn sign_out(&self) -> Result<SessionStatus> {
        info!("Signing out");

        match self.store.token().await {
            Some(token) => match self.revoker.revoke(&token).await {
                Ok(()) => info!("Token revoked"),
                Err(e) => warn!("Error revoking token, continuing sign out: {}", e),
            },
            None => info!("No auth token found"),
        }

        if let Err(e) = self.broker.clear_all_cached_tokens().await {
            warn!("Failed to clear cached tokens: {}", e);
        }

        let cleared = self.store.clear().await;
        let status = self.check_status().await;
        cleared?;
        Ok(status)
    }

    /// Drive control visibility from the stored session and show the saved list
    pub async fn check_status(&self) -> SessionStatus {
        if self.store.token().await.is_some() {
            debug!("User is signed in");
            self.renderer.show_signed_in();
            if let Some(saved) = self.store.saved_messages().await {
                debug!("Loaded {} saved messages", saved.len());
                self.renderer.show(&saved);
            }
            SessionStatus::SignedIn
        } else {
            debug!("User is not signed in");
            self.renderer.show_signed_out();
            SessionStatus::SignedOut
        }
    }
}

/// Load OAuth2 credentials from environment variables
///
/// # Environment Variables
/// - `GMAIL_CLIENT_ID`: OAuth2 client ID
/// - `GMAIL_CLIENT_SECRET`: OAuth2 client secret
/// - `GMAIL_REDIRECT_URI`: Redirect URI (optional, defaults to http://localhost:8080)
pub fn load_credentials_from_env() -> Result<ApplicationSecret> {
    let client_id = env::var("GMAIL_CLIENT_ID")
        .map_err(|_| PriorityError::ConfigError("GMAIL_CLIENT_ID not set".to_string()))?;
    let client_secret = env::var("GMAIL_CLIENT_SECRET")
        .map_err(|_| PriorityError::ConfigError("GMAIL_CLIENT_SECRET not set".to_string()))?;
    let redirect_uri =
        env::var("GMAIL_REDIRECT_URI").unwrap_or_else(|_| "http://localhost:8080".to_string());

    Ok(ApplicationSecret {
        client_id,
        client_secret,
        auth_uri: "https://accounts.google.com/o/oauth2/auth".to_string(),
        token_uri: "https://oauth2.googleapis.com/token".to_string(),
        redirect_uris: vec![redirect_uri],
        ..Default::default()
    })
}

/// Restrict a file holding tokens to its owner (0600)
#[cfg(unix)]
pub async fn secure_token_file(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mut perms = tokio::fs::metadata(path).await?.permissions();
    perms.set_mode(0o600);
    tokio::fs::set_permissions(path, perms).await?;
    Ok(())
}

/// Windows relies on the profile directory ACLs
#[cfg(windows)]
pub async fn secure_token_file(_path: &Path) -> Result<()> {
    Ok(())
}
