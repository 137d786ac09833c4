//! Local key/value persistence.
//!
//! Every persisted value is an opaque string; typed interpretation lives in
//! the settings store and the session identity manager.

mod database;
mod kv_repo;
mod memory;


pub use database::Database;
pub use kv_repo::KvRepo;
pub use memory::MemoryStore;

use async_trait::async_trait;
use std::collections::BTreeMap;

use crate::core::error::StorageError;

/// Well-known keys.
pub mod keys {
    pub const ENDPOINT: &str = "endpoint";
    pub const MODEL: &str = "model";
    pub const TEMPERATURE: &str = "temperature";
    pub const VOICE_OUTPUT: &str = "voice_output";
    pub const THEME: &str = "theme";
    pub const ACCENT_COLOR: &str = "accent_color";
    pub const SESSION_ID: &str = "session_id";
    pub const AUTH_TOKEN: &str = "auth_token";
    pub const USER: &str = "user";
    pub const MAX_MESSAGES: &str = "max_messages";
    pub const RATE_LIMIT_HINT: &str = "rate_limit_hint";
}

#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    async fn remove(&self, key: &str) -> Result<(), StorageError>;

    /// Every key currently stored.
    async fn snapshot(&self) -> Result<BTreeMap<String, String>, StorageError>;

    /// Writes all entries or none of them.
    async fn set_many(&self, entries: &BTreeMap<String, String>) -> Result<(), StorageError>;
}
