use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChatError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Voice error: {0}")]
    Voice(#[from] VoiceError),

    #[error("Backup error: {0}")]
    Backup(#[from] BackupError),

    #[error("{0}")]
    Validation(String),

    #[error("A message is already being sent")]
    SendInFlight,
}

impl ChatError {
    /// Text suitable for a transient notice.
    pub fn user_message(&self) -> String {
        match self {
            ChatError::Transport(e) => e.reason().to_string(),
            other => other.to_string(),
        }
    }
}

#[derive(Error, Debug, Clone)]
pub enum TransportError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl TransportError {
    /// Human-readable reason without the status prefix.
    pub fn reason(&self) -> &str {
        match self {
            TransportError::Network(m)
            | TransportError::Api { message: m, .. }
            | TransportError::RateLimited(m)
            | TransportError::InvalidResponse(m) => m,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            TransportError::Api { status, .. } => Some(*status),
            TransportError::RateLimited(_) => Some(429),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            TransportError::InvalidResponse(e.to_string())
        } else {
            TransportError::Network(e.to_string())
        }
    }
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file error: {0}")]
    File(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Error, Debug)]
pub enum VoiceError {
    #[error("Voice input is not available")]
    Unavailable,

    #[error("Failed to start {program}: {reason}")]
    Spawn { program: String, reason: String },

    #[error("Audio error: {0}")]
    Audio(String),

    #[error("Transcription failed: {0}")]
    Transcription(#[from] TransportError),
}

#[derive(Error, Debug)]
pub enum BackupError {
    #[error("Invalid backup file: {0}")]
    Invalid(String),

    #[error("Missing required field: {0}")]
    MissingField(&'static str),
}
