//! In-memory reference store.
//!
//! Useful for testing and one-off runs.

use super::{ReferenceStore, StoredReferences};
use crate::error::Result;
use crate::generator::VideoReference;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;

pub struct MemoryReferenceStore {
    entries: RwLock<HashMap<String, StoredReferences>>,
}

impl MemoryReferenceStore {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemoryReferenceStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ReferenceStore for MemoryReferenceStore {
    async fn put(&self, key: &str, references: &[VideoReference]) -> Result<()> {
        self.entries.write().await.insert(
            key.to_string(),
            StoredReferences {
                key: key.to_string(),
                references: references.to_vec(),
                updated_at: Utc::now(),
            },
        );
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<StoredReferences>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn append(&self, key: &str, reference: &VideoReference) -> Result<usize> {
        let mut entries = self.entries.write().await;
        let entry = entries.entry(key.to_string()).or_insert_with(|| StoredReferences {
            key: key.to_string(),
            references: Vec::new(),
            updated_at: Utc::now(),
        });
        entry.references.push(reference.clone());
        entry.updated_at = Utc::now();
        Ok(entry.references.len())
    }

    async fn list_keys(&self) -> Result<Vec<String>> {
        let mut keys: Vec<String> = self.entries.read().await.keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_replaces() {
        let store = MemoryReferenceStore::new();
        store.put("k", &[VideoReference::new("a")]).await.unwrap();
        store.put("k", &[VideoReference::new("b")]).await.unwrap();
        let stored = store.get("k").await.unwrap().unwrap();
        assert_eq!(stored.references, vec![VideoReference::new("b")]);
        assert_eq!(store.list_keys().await.unwrap(), vec!["k"]);
    }
}
