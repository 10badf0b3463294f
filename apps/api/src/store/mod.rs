//! Record Store Adapter: wraps the external key-value store holding résumé records.
//!
//! The store is treated as last-writer-wins. Records are only ever written as full
//! overwrites by the upload pipeline or the analysis worker.

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

use crate::models::resume::{record_key, ResumeRecord, KEY_PREFIX};

pub mod memory;
pub mod redis;

pub use self::memory::MemoryKvStore;
pub use self::redis::RedisKvStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Redis error: {0}")]
    Redis(#[from] ::redis::RedisError),

    #[error("Failed to encode record: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Opaque async key-value API.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
    /// Returns every key starting with `prefix`, in no particular order.
    async fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError>;
}

/// Typed access to `resume:<id>` records.
#[derive(Clone)]
pub struct ResumeStore {
    kv: Arc<dyn KeyValueStore>,
}

impl ResumeStore {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    /// Persists the full record, replacing whatever was stored under its key.
    pub async fn put(&self, record: &ResumeRecord) -> Result<(), StoreError> {
        let text = record.encode()?;
        self.kv.set(&record.key(), &text).await
    }

    /// Raw stored text. Decoding is left to the caller so corruption can be told apart
    /// from absence.
    pub async fn fetch_raw(&self, id: &str) -> Result<Option<String>, StoreError> {
        self.kv.get(&record_key(id)).await
    }

    /// Every decodable record under `resume:*`, newest first. Undecodable entries are
    /// logged and skipped.
    pub async fn list_records(&self) -> Result<Vec<ResumeRecord>, StoreError> {
        let mut keys = self.kv.list(KEY_PREFIX).await?;
        keys.sort();

        let mut records = Vec::with_capacity(keys.len());
        for key in keys {
            let Some(text) = self.kv.get(&key).await? else {
                continue;
            };
            match ResumeRecord::decode(&text) {
                Ok(record) => records.push(record),
                Err(e) => warn!("Skipping undecodable record {key}: {e}"),
            }
        }
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records)
    }
}
