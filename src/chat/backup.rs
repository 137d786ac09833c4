use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::core::error::BackupError;
use crate::core::message::Message;
use crate::core::settings::Settings;
use crate::storage::keys;

pub const BACKUP_VERSION: &str = "1.0";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub session_id: String,
    #[serde(default)]
    pub messages: Vec<Message>,
}

/// Versioned backup of settings, session state and the whole local store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupEnvelope {
    pub version: String,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    pub settings: Settings,
    #[serde(default)]
    pub session: Option<SessionSnapshot>,
    #[serde(default)]
    pub storage: BTreeMap<String, String>,
}

impl BackupEnvelope {
    pub fn new(
        settings: Settings,
        session: SessionSnapshot,
        storage: BTreeMap<String, String>,
    ) -> Self {
        Self {
            version: BACKUP_VERSION.into(),
            timestamp: Some(Utc::now()),
            settings,
            session: Some(session),
            storage,
        }
    }
}

/// Validates a backup document completely before anything is applied.
pub fn parse_backup(json: &str) -> Result<BackupEnvelope, BackupError> {
    let value: serde_json::Value =
        serde_json::from_str(json).map_err(|e| BackupError::Invalid(e.to_string()))?;
    if !value.is_object() {
        return Err(BackupError::Invalid("expected a JSON object".into()));
    }
    for field in ["version", "settings"] {
        if value.get(field).map_or(true, |v| v.is_null()) {
            return Err(BackupError::MissingField(field));
        }
    }
    let envelope: BackupEnvelope =
        serde_json::from_value(value).map_err(|e| BackupError::Invalid(e.to_string()))?;

    let session_ids = envelope
        .session
        .as_ref()
        .map(|s| ("session.session_id", s.session_id.as_str()))
        .into_iter()
        .chain(
            envelope
                .storage
                .get(keys::SESSION_ID)
                .map(|id| ("storage.session_id", id.as_str())),
        );
    for (field, id) in session_ids {
        if id.trim().is_empty() {
            return Err(BackupError::Invalid(format!("{field} is blank")));
        }
    }
    Ok(envelope)
}
