use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Normalized view of a provider message
///
/// Only `read` ever changes after a message is fetched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub subject: String,
    pub snippet: String,
    #[serde(default)]
    pub read: bool,
}

impl Message {
    pub fn new(id: impl Into<String>, subject: impl Into<String>, snippet: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            subject: subject.into(),
            snippet: snippet.into(),
            read: false,
        }
    }
}

/// Contents of the local session file: one token slot and one saved-list slot
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoredSession {
    #[serde(default)]
    pub auth_token: Option<String>,
    #[serde(default)]
    pub saved_messages: Option<Vec<Message>>,
    #[serde(default)]
    pub saved_at: Option<DateTime<Utc>>,
}

/// Visible state of the popup controls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionStatus {
    SignedOut,
    SignedIn,
}

/// Shorten a token for log output
pub fn redact_token(token: &str) -> String {
    let prefix: String = token.chars().take(6).collect();
    format!("{}…({} chars)", prefix, token.chars().count())
}
