use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Mutex;

use super::KeyValueStore;
use crate::core::error::StorageError;

/// Process-local store, used by `--ephemeral` runs and tests.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<String, String>>, StorageError> {
        self.entries
            .lock()
            .map_err(|_| StorageError::Database("memory store poisoned".into()))
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.lock()?.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.lock()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.lock()?.remove(key);
        Ok(())
    }

    async fn snapshot(&self) -> Result<BTreeMap<String, String>, StorageError> {
        Ok(self.lock()?.clone())
    }

    async fn set_many(&self, entries: &BTreeMap<String, String>) -> Result<(), StorageError> {
        let mut map = self.lock()?;
        for (k, v) in entries {
            map.insert(k.clone(), v.clone());
        }
        Ok(())
    }
}
