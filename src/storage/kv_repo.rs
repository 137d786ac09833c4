use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;
use std::collections::BTreeMap;

use super::KeyValueStore;
use crate::core::error::StorageError;

const UPSERT: &str = "INSERT INTO kv_store (key, value, updated_at) VALUES (?, ?, ?) \
     ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at";

pub struct KvRepo {
    pool: SqlitePool,
}

impl KvRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl KeyValueStore for KvRepo {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let row: Option<(String,)> = sqlx::query_as("SELECT value FROM kv_store WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::Database(e.to_string()))?;
        Ok(row.map(|r| r.0))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        sqlx::query(UPSERT)
            .bind(key)
            .bind(value)
            .bind(Utc::now().to_rfc3339())
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::Database(e.to_string()))?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM kv_store WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::Database(e.to_string()))?;
        Ok(())
    }

    async fn snapshot(&self) -> Result<BTreeMap<String, String>, StorageError> {
        let rows: Vec<(String, String)> =
            sqlx::query_as("SELECT key, value FROM kv_store ORDER BY key")
                .fetch_all(&self.pool)
                .await
                .map_err(|e| StorageError::Database(e.to_string()))?;
        Ok(rows.into_iter().collect())
    }

    async fn set_many(&self, entries: &BTreeMap<String, String>) -> Result<(), StorageError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StorageError::Database(e.to_string()))?;
        let now = Utc::now().to_rfc3339();
        for (key, value) in entries {
            sqlx::query(UPSERT)
                .bind(key)
                .bind(value)
                .bind(&now)
                .execute(&mut *tx)
                .await
                .map_err(|e| StorageError::Database(e.to_string()))?;
        }
        tx.commit()
            .await
            .map_err(|e| StorageError::Database(e.to_string()))?;
        Ok(())
    }
}
