use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::core::error::StorageError;
use crate::storage::{keys, KeyValueStore};

/// Entry in the session list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: String,
    pub title: Option<String>,
    pub message_count: u64,
}

impl SessionSummary {
    pub fn display_title(&self) -> &str {
        self.title
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .unwrap_or("New Chat")
    }
}

pub fn new_session_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Owns the persisted identifier of the active conversation.
pub struct SessionIdentity {
    store: Arc<dyn KeyValueStore>,
}

impl SessionIdentity {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Persisted identifier, or a fresh one that is persisted before returning.
    pub async fn current(&self) -> Result<String, StorageError> {
        if let Some(id) = self
            .store
            .get(keys::SESSION_ID)
            .await?
            .filter(|s| !s.trim().is_empty())
        {
            return Ok(id);
        }
        let id = new_session_id();
        self.store.set(keys::SESSION_ID, &id).await?;
        tracing::debug!(session_id = %id, "created session identifier");
        Ok(id)
    }

    /// Replaces the identifier with a new random one.
    pub async fn rotate(&self) -> Result<String, StorageError> {
        let previous = self.store.get(keys::SESSION_ID).await?;
        let mut id = new_session_id();
        while previous.as_deref() == Some(id.as_str()) {
            id = new_session_id();
        }
        self.store.set(keys::SESSION_ID, &id).await?;
        tracing::debug!(session_id = %id, "rotated session identifier");
        Ok(id)
    }

    pub async fn adopt(&self, id: &str) -> Result<(), StorageError> {
        self.store.set(keys::SESSION_ID, id).await
    }
}
