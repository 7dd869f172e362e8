use async_trait::async_trait;
use papaya::HashMap as PapayaHashMap;
use permsync_storage::{KeyValueStore, StorageError};
use std::collections::BTreeMap;

/// Key/value store backed by a papaya lock-free map.
#[derive(Debug, Default)]
pub struct InMemoryKeyValueStore {
    data: PapayaHashMap<String, String>,
}

impl InMemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: BTreeMap<String, String>) -> Self {
        let store = Self::new();
        {
            let map = store.data.pin();
            for (k, v) in entries {
                map.insert(k, v);
            }
        }
        store
    }

    /// Sorted copy of every entry.
    pub fn export(&self) -> BTreeMap<String, String> {
        self.data
            .pin()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

#[async_trait]
impl KeyValueStore for InMemoryKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.data.pin().get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.data.pin().insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.data.pin().remove(key);
        Ok(())
    }
}
