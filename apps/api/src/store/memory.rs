use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

use super::{KeyValueStore, StoreError};

/// In-process store for tests and local runs.
#[derive(Default)]
pub struct MemoryKvStore {
    entries: RwLock<BTreeMap<String, String>>,
}

#[async_trait]
impl KeyValueStore for MemoryKvStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        Ok(self
            .entries
            .read()
            .await
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_overwrites_and_list_filters_by_prefix() {
        let store = MemoryKvStore::default();
        store.set("resume:a", "1").await.unwrap();
        store.set("resume:a", "2").await.unwrap();
        store.set("other:b", "3").await.unwrap();

        assert_eq!(store.get("resume:a").await.unwrap().as_deref(), Some("2"));
        assert_eq!(store.list("resume:").await.unwrap(), vec!["resume:a"]);
    }
}
