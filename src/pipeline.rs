//! Fetch, rank, persist, render

use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, info_span, warn, Instrument};

use crate::client::{fetch_important, GmailClient};
use crate::config::MailConfig;
use crate::error::Result;
use crate::models::Message;
use crate::ranking::PriorityRanker;
use crate::render::Renderer;
use crate::store::CredentialStore;

/// Shows the busy indicator for as long as it lives
struct BusyGuard<'a> {
    renderer: &'a dyn Renderer,
}

impl<'a> BusyGuard<'a> {
    fn start(renderer: &'a dyn Renderer) -> Self {
        renderer.set_busy(true);
        Self { renderer }
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.renderer.set_busy(false);
    }
}

/// Sequences mail fetch, ranking, persistence and rendering
///
/// Runs and mark-read actions share one lock so writes to the saved list
/// never interleave.
pub struct SortPipeline {
    mail: Arc<dyn GmailClient>,
    ranker: Arc<dyn PriorityRanker>,
    store: Arc<CredentialStore>,
    renderer: Arc<dyn Renderer>,
    mail_config: MailConfig,
    run_lock: Mutex<()>,
}

impl SortPipeline {
    pub fn new(
        mail: Arc<dyn GmailClient>,
        ranker: Arc<dyn PriorityRanker>,
        store: Arc<CredentialStore>,
        renderer: Arc<dyn Renderer>,
        mail_config: MailConfig,
    ) -> Self {
        Self {
            mail,
            ranker,
            store,
            renderer,
            mail_config,
            run_lock: Mutex::new(()),
        }
    }

    /// Fetch, rank, persist and show. On failure the saved list is untouched.
    pub async fn run_sort_pipeline(&self, token: &str) -> Result<Vec<Message>> {
        let _running = self.run_lock.lock().await;
        let run_id = uuid::Uuid::new_v4();

        async {
            let _busy = BusyGuard::start(self.renderer.as_ref());

            let messages = fetch_important(self.mail.as_ref(), token, &self.mail_config)
                .await
                .map_err(|e| {
                    error!("Error fetching emails: {}", e);
                    e
                })?;

            let ranked = self.ranker.rank(&messages).await.map_err(|e| {
                error!("Error sorting emails: {}", e);
                e
            })?;

            self.store.save_messages_for(token, &ranked).await.map_err(|e| {
                error!("Error saving sorted emails: {}", e);
                e
            })?;

            self.renderer.show(&ranked);
            info!("Displayed {} ranked messages", ranked.len());
            Ok(ranked)
        }
        .instrument(info_span!("sort_pipeline", %run_id))
        .await
    }

    /// Mark a message read, then drop it from the saved list and re-render
    ///
    /// The local list only changes after the provider confirms the mutation.
    pub async fn mark_read(&self, token: &str, message_id: &str) -> Result<Vec<Message>> {
        let _running = self.run_lock.lock().await;

        self.mail.mark_read(token, message_id).await.map_err(|e| {
            error!("Error marking {} as read: {}", message_id, e);
            e
        })?;

        let mut messages = self.store.saved_messages().await.unwrap_or_default();
        let before = messages.len();
        messages.retain(|m| m.id != message_id);
        if messages.len() == before {
            warn!("Message {} was not in the saved list", message_id);
        }

        self.store.save_messages_for(token, &messages).await?;
        self.renderer.show(&messages);
        info!("Marked {} as read, {} messages left", message_id, messages.len());
        Ok(messages)
    }
}
