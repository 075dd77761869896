//! Gmail REST client: search, detail fetch and read-state mutation

use async_trait::async_trait;
use futures::stream::{self, StreamExt, TryStreamExt};
use google_gmail1::{
    api::{Message as GmailMessage, ModifyMessageRequest},
    hyper_rustls, hyper_util, Gmail,
};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::MailConfig;
use crate::error::{PriorityError, Result};
use crate::models::Message;

const GMAIL_MODIFY_SCOPE: &str = "https://www.googleapis.com/auth/gmail.modify";

/// Label whose removal marks a message read
pub const UNREAD_LABEL: &str = "UNREAD";

/// Type alias for Gmail Hub to simplify type signatures
pub type GmailHub =
    Gmail<hyper_rustls::HttpsConnector<hyper_util::client::legacy::connect::HttpConnector>>;

/// Trait defining the Gmail operations the pipeline needs, for easier testing
#[async_trait]
pub trait GmailClient: Send + Sync {
    /// List up to `max_results` message IDs matching a search query
    async fn list_message_ids(&self, token: &str, query: &str, max_results: u32)
        -> Result<Vec<String>>;

    /// Fetch one message and normalize it
    async fn get_message(&self, token: &str, id: &str) -> Result<Message>;

    /// Remove the UNREAD label from a message
    async fn mark_read(&self, token: &str, id: &str) -> Result<()>;
}

/// Search, then fetch each hit's details
///
/// The search completes before any detail fetch starts. Detail fetches run
/// concurrently but results keep search order, and one failed fetch fails the
/// whole batch.
pub async fn fetch_important<C>(client: &C, token: &str, config: &MailConfig) -> Result<Vec<Message>>
where
    C: GmailClient + ?Sized,
{
    info!("Fetching messages matching {:?}", config.query);

    let ids = client
        .list_message_ids(token, &config.query, config.max_results)
        .await?;
    if ids.is_empty() {
        return Err(PriorityError::NoResults);
    }
    debug!("Search returned {} message ids", ids.len());

    let messages: Vec<Message> = stream::iter(ids)
        .map(|id| async move { client.get_message(token, &id).await })
        .buffered(config.max_concurrent_requests.max(1))
        .try_collect()
        .await?;

    info!("Fetched {} messages", messages.len());
    Ok(messages)
}

/// Gmail client over the google-gmail1 hub, authenticated by a bearer token
pub struct ProductionGmailClient {
    base_url: Option<String>,
    timeout: Duration,
}

impl ProductionGmailClient {
    /// Create a new production Gmail client
    ///
    /// # Arguments
    /// * `base_url` - Optional API base override (must end with `/`)
    /// * `timeout` - Upper bound for each remote call
    pub fn new(base_url: Option<String>, timeout: Duration) -> Self {
        Self { base_url, timeout }
    }

    /// Build a hub that presents `token` as its bearer credential
    fn hub(&self, token: &str) -> Result<GmailHub> {
        crate::http::install_crypto_provider();

        // HTTP/1 only; HTTP/2 negotiation misbehaves with google-gmail1
        let client =
            hyper_util::client::legacy::Client::builder(hyper_util::rt::TokioExecutor::new())
                .build(
                    hyper_rustls::HttpsConnectorBuilder::new()
                        .with_native_roots()
                        .map_err(|e| {
                            PriorityError::TransportError(format!(
                                "Failed to load TLS roots: {}",
                                e
                            ))
                        })?
                        .https_or_http()
                        .enable_http1()
                        .build(),
                );

        let mut hub = Gmail::new(client, token.to_string());
        if let Some(base_url) = &self.base_url {
            hub.base_url(base_url.clone());
        }
        Ok(hub)
    }

    /// Bound a remote call by the configured timeout
    async fn with_timeout<T, Fut>(&self, operation: &str, call: Fut) -> Result<T>
    where
        Fut: Future<Output = Result<T>>,
    {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => {
                warn!("Gmail API {} call timed out after {:?}", operation, self.timeout);
                Err(PriorityError::Timeout {
                    operation: operation.to_string(),
                    secs: self.timeout.as_secs(),
                })
            }
        }
    }
}

/// Normalize a Gmail API message
pub fn parse_message(msg: GmailMessage) -> Result<Message> {
    let id = msg
        .id
        .ok_or_else(|| PriorityError::InvalidMessageFormat("Missing message ID".to_string()))?;

    let subject = msg
        .payload
        .as_ref()
        .and_then(|p| p.headers.as_ref())
        .and_then(|headers| {
            headers.iter().find_map(|header| match (&header.name, &header.value) {
                (Some(name), Some(value)) if name.eq_ignore_ascii_case("Subject") => {
                    Some(value.clone())
                }
                _ => None,
            })
        })
        .unwrap_or_default();

    let read = !msg
        .label_ids
        .as_ref()
        .is_some_and(|labels| labels.iter().any(|l| l == UNREAD_LABEL));

    Ok(Message {
        id,
        subject,
        snippet: msg.snippet.unwrap_or_default(),
        read,
    })
}

#[async_trait]
impl GmailClient for ProductionGmailClient {
    async fn list_message_ids(
        &self,
        token: &str,
        query: &str,
        max_results: u32,
    ) -> Result<Vec<String>> {
        let hub = self.hub(token)?;
        let (_, response) = self
            .with_timeout("messages.list", async {
                hub.users()
                    .messages_list("me")
                    .q(query)
                    .max_results(max_results)
                    .add_scope(GMAIL_MODIFY_SCOPE)
                    .doit()
                    .await
                    .map_err(PriorityError::from)
            })
            .await?;

        Ok(response
            .messages
            .unwrap_or_default()
            .into_iter()
            .filter_map(|msg_ref| msg_ref.id)
            .collect())
    }

    async fn get_message(&self, token: &str, id: &str) -> Result<Message> {
        let hub = self.hub(token)?;
        let (_, msg) = self
            .with_timeout("messages.get", async {
                hub.users()
                    .messages_get("me", id)
                    .format("metadata")
                    .add_metadata_headers("Subject")
                    .add_scope(GMAIL_MODIFY_SCOPE)
                    .doit()
                    .await
                    .map_err(PriorityError::from)
            })
            .await?;

        parse_message(msg)
    }

    async fn mark_read(&self, token: &str, id: &str) -> Result<()> {
        let hub = self.hub(token)?;
        let modify_request = ModifyMessageRequest {
            add_label_ids: None,
            remove_label_ids: Some(vec![UNREAD_LABEL.to_string()]),
        };

        self.with_timeout("messages.modify", async {
            hub.users()
                .messages_modify(modify_request, "me", id)
                .add_scope(GMAIL_MODIFY_SCOPE)
                .doit()
                .await
                .map_err(PriorityError::from)
        })
        .await?;

        debug!("Marked {} as read", id);
        Ok(())
    }
}
