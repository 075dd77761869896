//! Local session persistence: the token slot and the saved ranked list

use chrono::Utc;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

use crate::error::{PriorityError, Result};
use crate::models::{Message, StoredSession};

/// Process-wide key-value store with two slots, backed by a JSON file
///
/// The in-memory copy is authoritative for reads. Every mutation is written
/// through to disk with a temp-file-and-rename so an interrupted write never
/// leaves a half-written list behind.
pub struct CredentialStore {
    path: PathBuf,
    session: Mutex<StoredSession>,
}

impl CredentialStore {
    /// Open the store, loading any existing session file
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let session = Self::load(&path).await?;
        Ok(Self {
            path,
            session: Mutex::new(session),
        })
    }

    async fn load(path: &Path) -> Result<StoredSession> {
        if !path.exists() {
            tracing::debug!("No session file at {:?}, starting signed out", path);
            return Ok(StoredSession::default());
        }

        let json = tokio::fs::read_to_string(path).await?;
        let session: StoredSession = serde_json::from_str(&json).map_err(|e| {
            PriorityError::StateError(format!("Corrupt session file {:?}: {}", path, e))
        })?;

        tracing::debug!(
            "Loaded session: signed_in={}, saved_messages={}",
            session.auth_token.is_some(),
            session.saved_messages.as_ref().map_or(0, Vec::len)
        );
        Ok(session)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn token(&self) -> Option<String> {
        self.session.lock().await.auth_token.clone()
    }

    pub async fn set_token(&self, token: String) -> Result<()> {
        let mut session = self.session.lock().await;
        let mut next = session.clone();
        next.auth_token = Some(token);
        self.write(&next).await?;
        *session = next;
        Ok(())
    }

    pub async fn saved_messages(&self) -> Option<Vec<Message>> {
        self.session.lock().await.saved_messages.clone()
    }

    /// Replace the saved list. The previous list stays in place if the write fails.
    pub async fn save_messages(&self, messages: &[Message]) -> Result<()> {
        let mut session = self.session.lock().await;
        let mut next = session.clone();
        next.saved_messages = Some(messages.to_vec());
        next.saved_at = Some(Utc::now());
        self.write(&next).await?;
        *session = next;
        tracing::debug!("Saved {} messages to {:?}", messages.len(), self.path);
        Ok(())
    }

    /// Replace the saved list only while `token` is still the stored session token.
    ///
    /// A run that outlives its session (sign-out or a new sign-in) gets
    /// `NotSignedIn` and nothing is written.
    pub async fn save_messages_for(&self, token: &str, messages: &[Message]) -> Result<()> {
        let mut session = self.session.lock().await;
        if session.auth_token.as_deref() != Some(token) {
            tracing::warn!("Session changed during the run, dropping {} messages", messages.len());
            return Err(PriorityError::NotSignedIn);
        }

        let mut next = session.clone();
        next.saved_messages = Some(messages.to_vec());
        next.saved_at = Some(Utc::now());
        self.write(&next).await?;
        *session = next;
        tracing::debug!("Saved {} messages to {:?}", messages.len(), self.path);
        Ok(())
    }

    /// Empty both slots together. Memory is only reset once the file is gone.
    pub async fn clear(&self) -> Result<()> {
        let mut session = self.session.lock().await;

        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        *session = StoredSession::default();
        tracing::debug!("Cleared session store {:?}", self.path);
        Ok(())
    }

    async fn write(&self, session: &StoredSession) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let json = serde_json::to_string_pretty(session)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        crate::auth::secure_token_file(&tmp).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<Message> {
        vec![
            Message::new("a", "Urgent", "Server down"),
            Message::new("b", "FYI", "Lunch menu"),
        ]
    }

    #[tokio::test]
    async fn test_open_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::open(dir.path().join("session.json"))
            .await
            .unwrap();

        assert!(store.token().await.is_none());
        assert!(store.saved_messages().await.is_none());
    }

    #[tokio::test]
    async fn test_slots_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("session.json");

        let store = CredentialStore::open(&path).await.unwrap();
        store.set_token("token-1".to_string()).await.unwrap();
        store.save_messages(&sample()).await.unwrap();
        drop(store);

        let reopened = CredentialStore::open(&path).await.unwrap();
        assert_eq!(reopened.token().await.as_deref(), Some("token-1"));
        assert_eq!(reopened.saved_messages().await.unwrap(), sample());
    }

    #[tokio::test]
    async fn test_clear_empties_both_slots_and_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");

        let store = CredentialStore::open(&path).await.unwrap();
        store.set_token("token-1".to_string()).await.unwrap();
        store.save_messages(&sample()).await.unwrap();
        assert!(path.exists());

        store.clear().await.unwrap();
        assert!(store.token().await.is_none());
        assert!(store.saved_messages().await.is_none());
        assert!(!path.exists());

        // Clearing twice is fine
        store.clear().await.unwrap();
    }

    #[tokio::test]
    async fn test_failed_file_removal_keeps_session() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");

        let store = CredentialStore::open(&path).await.unwrap();
        store.set_token("token-1".to_string()).await.unwrap();
        store.save_messages(&sample()).await.unwrap();

        // A directory in place of the session file cannot be unlinked
        tokio::fs::remove_file(&path).await.unwrap();
        tokio::fs::create_dir(&path).await.unwrap();

        assert!(store.clear().await.is_err());
        assert_eq!(store.token().await.as_deref(), Some("token-1"));
        assert_eq!(store.saved_messages().await.unwrap(), sample());
    }

    #[tokio::test]
    async fn test_save_for_current_token() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");

        let store = CredentialStore::open(&path).await.unwrap();
        store.set_token("token-1".to_string()).await.unwrap();
        store.save_messages_for("token-1", &sample()).await.unwrap();

        let reopened = CredentialStore::open(&path).await.unwrap();
        assert_eq!(reopened.saved_messages().await.unwrap(), sample());
    }

    #[tokio::test]
    async fn test_save_for_stale_token_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");

        let store = CredentialStore::open(&path).await.unwrap();
        let result = store.save_messages_for("token-1", &sample()).await;
        assert!(matches!(result, Err(PriorityError::NotSignedIn)));
        assert!(store.saved_messages().await.is_none());
        assert!(!path.exists());

        store.set_token("token-2".to_string()).await.unwrap();
        let result = store.save_messages_for("token-1", &sample()).await;
        assert!(matches!(result, Err(PriorityError::NotSignedIn)));
        assert!(store.saved_messages().await.is_none());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_state_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        tokio::fs::write(&path, "{ not json").await.unwrap();

        let result = CredentialStore::open(&path).await;
        assert!(matches!(result, Err(PriorityError::StateError(_))));
    }

    #[tokio::test]
    async fn test_failed_write_keeps_previous_list() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");

        let store = CredentialStore::open(&path).await.unwrap();
        store.save_messages(&sample()).await.unwrap();

        // A directory squatting on the temp path makes the next write fail
        tokio::fs::create_dir(path.with_extension("json.tmp"))
            .await
            .unwrap();

        let result = store.save_messages(&[]).await;
        assert!(result.is_err());
        assert_eq!(store.saved_messages().await.unwrap(), sample());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_session_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        let store = CredentialStore::open(&path).await.unwrap();
        store.set_token("secret".to_string()).await.unwrap();

        let mode = tokio::fs::metadata(&path).await.unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
