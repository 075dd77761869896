//! Button handlers wiring the auth manager, pipeline and renderer together

use std::sync::Arc;
use tracing::info;

use crate::auth::{AuthManager, HttpTokenRevoker, IdentityBroker, InstalledFlowBroker, TokenRevoker};
use crate::client::{GmailClient, ProductionGmailClient};
use crate::config::Config;
use crate::error::{PriorityError, Result};
use crate::http::HttpTransport;
use crate::models::{Message, SessionStatus};
use crate::pipeline::SortPipeline;
use crate::ranking::{api_key_source, ChatCompletionRanker, PriorityRanker};
use crate::render::Renderer;
use crate::store::CredentialStore;

/// External collaborators of the popup
pub struct Services {
    pub broker: Arc<dyn IdentityBroker>,
    pub revoker: Arc<dyn TokenRevoker>,
    pub mail: Arc<dyn GmailClient>,
    pub ranker: Arc<dyn PriorityRanker>,
}

impl Services {
    /// Production services built from configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        let transport = HttpTransport::new(config.network.request_timeout())?;

        Ok(Self {
            broker: Arc::new(InstalledFlowBroker::new(
                &config.auth.credentials,
                &config.auth.token_cache,
            )),
            revoker: Arc::new(HttpTokenRevoker::new(
                transport.clone(),
                config.auth.revoke_url.clone(),
            )),
            mail: Arc::new(ProductionGmailClient::new(
                config.mail.base_url.clone(),
                config.network.request_timeout(),
            )),
            ranker: Arc::new(ChatCompletionRanker::new(
                transport,
                config.ranking.clone(),
                api_key_source(&config.ranking),
            )),
        })
    }
}

/// The popup: one handler per control
pub struct Popup {
    auth: AuthManager,
    pipeline: SortPipeline,
    store: Arc<CredentialStore>,
}

impl Popup {
    pub fn new(
        config: &Config,
        services: Services,
        store: Arc<CredentialStore>,
        renderer: Arc<dyn Renderer>,
    ) -> Self {
        let auth = AuthManager::new(
            services.broker,
            services.revoker,
            Arc::clone(&store),
            Arc::clone(&renderer),
        );
        let pipeline = SortPipeline::new(
            services.mail,
            services.ranker,
            Arc::clone(&store),
            renderer,
            config.mail.clone(),
        );

        Self {
            auth,
            pipeline,
            store,
        }
    }

    /// Popup opened: show controls for the stored session
    pub async fn on_load(&self) -> SessionStatus {
        self.auth.check_status().await
    }

    /// Whether a session token is stored, without rendering anything
    pub async fn is_signed_in(&self) -> bool {
        self.store.token().await.is_some()
    }

    pub async fn on_sign_in(&self) -> Result<SessionStatus> {
        self.auth.sign_in().await
    }

    pub async fn on_sign_out(&self) -> Result<SessionStatus> {
        self.auth.sign_out().await
    }

    /// Sort button. Does nothing without a stored token.
    pub async fn on_sort(&self) -> Result<Option<Vec<Message>>> {
        match self.store.token().await {
            Some(token) => self.pipeline.run_sort_pipeline(&token).await.map(Some),
            None => {
                info!("No auth token found");
                Ok(None)
            }
        }
    }

    /// Per-item "mark read" control
    pub async fn on_mark_read(&self, message_id: &str) -> Result<Vec<Message>> {
        let token = self.store.token().await.ok_or(PriorityError::NotSignedIn)?;
        self.pipeline.mark_read(&token, message_id).await
    }

    /// The list currently saved for display
    pub async fn saved_messages(&self) -> Vec<Message> {
        self.store.saved_messages().await.unwrap_or_default()
    }
}
