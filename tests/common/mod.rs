//! Common test utilities and fixtures

#![allow(dead_code)]

use std::sync::Arc;

use gmail_priority::auth::{IdentityBroker, TokenRevoker};
use gmail_priority::client::GmailClient;
use gmail_priority::config::MailConfig;
use gmail_priority::error::Result;
use gmail_priority::models::Message;
use gmail_priority::ranking::PriorityRanker;
use gmail_priority::store::CredentialStore;
use mockall::mock;
use serde_json::json;
use tempfile::TempDir;

/// Create a test message with a generated snippet
pub fn create_test_message(id: &str, subject: &str) -> Message {
    Message::new(id, subject, format!("Snippet for {}", id))
}

/// A list of `n` messages with ids `m1..=mn`
pub fn create_test_messages(n: usize) -> Vec<Message> {
    (1..=n)
        .map(|i| create_test_message(&format!("m{}", i), &format!("Subject {}", i)))
        .collect()
}

/// Store backed by a fresh temporary directory; keep the `TempDir` alive
pub async fn temp_store() -> (TempDir, Arc<CredentialStore>) {
    let dir = tempfile::tempdir().unwrap();
    let store = CredentialStore::open(dir.path().join("session.json"))
        .await
        .unwrap();
    (dir, Arc::new(store))
}

/// Temp-directory store already holding `token` in its session slot
pub async fn signed_in_store(token: &str) -> (TempDir, Arc<CredentialStore>) {
    let (dir, store) = temp_store().await;
    store.set_token(token.to_string()).await.unwrap();
    (dir, store)
}

/// Default mail settings with the given concurrency
pub fn mail_config(max_concurrent_requests: usize) -> MailConfig {
    MailConfig {
        max_concurrent_requests,
        ..MailConfig::default()
    }
}

/// Create mock Gmail API message response (JSON, metadata format)
pub fn mock_gmail_message_response(id: &str, subject: &str, snippet: &str) -> serde_json::Value {
    json!({
        "id": id,
        "threadId": format!("thread_{}", id),
        "labelIds": ["INBOX", "IMPORTANT", "UNREAD"],
        "snippet": snippet,
        "payload": {
            "mimeType": "multipart/alternative",
            "headers": [
                {"name": "From", "value": "someone@example.com"},
                {"name": "Subject", "value": subject},
                {"name": "Date", "value": "Mon, 1 Jan 2024 10:00:00 -0800"}
            ]
        },
        "internalDate": "1704124800000",
        "sizeEstimate": 1234
    })
}

/// Create mock Gmail list messages response (JSON)
pub fn mock_gmail_list_response(message_ids: &[&str]) -> serde_json::Value {
    let messages: Vec<serde_json::Value> = message_ids
        .iter()
        .map(|id| {
            json!({
                "id": id,
                "threadId": format!("thread_{}", id)
            })
        })
        .collect();

    json!({
        "messages": messages,
        "resultSizeEstimate": messages.len()
    })
}

/// Chat-completion response whose answer is `content`
pub fn mock_completion_response(content: &str) -> serde_json::Value {
    json!({
        "id": "chatcmpl-test",
        "object": "chat.completion",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": content},
            "finish_reason": "stop"
        }]
    })
}

/// Chat-completion error envelope
pub fn mock_completion_error(message: &str) -> serde_json::Value {
    json!({
        "error": {
            "message": message,
            "type": "invalid_request_error"
        }
    })
}

// Mock implementation of GmailClient for testing
mock! {
    pub GmailClient {}

    #[async_trait::async_trait]
    impl GmailClient for GmailClient {
        async fn list_message_ids(&self, token: &str, query: &str, max_results: u32) -> Result<Vec<String>>;
        async fn get_message(&self, token: &str, id: &str) -> Result<Message>;
        async fn mark_read(&self, token: &str, id: &str) -> Result<()>;
    }
}

mock! {
    pub Ranker {}

    #[async_trait::async_trait]
    impl PriorityRanker for Ranker {
        async fn rank(&self, messages: &[Message]) -> Result<Vec<Message>>;
    }
}

mock! {
    pub Broker {}

    #[async_trait::async_trait]
    impl IdentityBroker for Broker {
        async fn clear_all_cached_tokens(&self) -> Result<()>;
        async fn get_auth_token(&self, interactive: bool) -> Result<String>;
        async fn remove_cached_token(&self, token: &str) -> Result<()>;
    }
}

mock! {
    pub Revoker {}

    #[async_trait::async_trait]
    impl TokenRevoker for Revoker {
        async fn revoke(&self, token: &str) -> Result<()>;
    }
}

/// Gmail mock that answers a search with `messages` and serves each detail
pub fn gmail_serving(messages: Vec<Message>) -> MockGmailClient {
    let mut mail = MockGmailClient::new();
    let ids: Vec<String> = messages.iter().map(|m| m.id.clone()).collect();
    mail.expect_list_message_ids()
        .returning(move |_, _, _| Ok(ids.clone()));
    mail.expect_get_message().returning(move |_, id| {
        Ok(messages
            .iter()
            .find(|m| m.id == id)
            .cloned()
            .unwrap_or_else(|| Message::new(id, "", "")))
    });
    mail
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_test_messages() {
        let messages = create_test_messages(3);
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0].id, "m1");
        assert_eq!(messages[2].subject, "Subject 3");
        assert!(!messages[1].read);
    }

    #[test]
    fn test_mock_gmail_list_response() {
        let response = mock_gmail_list_response(&["msg1", "msg2"]);
        assert_eq!(response["messages"].as_array().unwrap().len(), 2);
        assert_eq!(response["messages"][1]["id"], "msg2");
    }

    #[test]
    fn test_mock_completion_response() {
        let response = mock_completion_response("2,1");
        assert_eq!(response["choices"][0]["message"]["content"], "2,1");
    }
}
