//! Persisted video references keyed by series or user id.
//!
//! Provides a trait-based interface so the pipeline can run against an
//! in-memory map in tests and SQLite otherwise.

mod memory;
mod sqlite;

pub use memory::MemoryReferenceStore;
pub use sqlite::SqliteReferenceStore;

use crate::error::Result;
use crate::generator::VideoReference;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

/// References stored under one key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredReferences {
    pub key: String,
    pub references: Vec<VideoReference>,
    pub updated_at: DateTime<Utc>,
}

/// Key-value store of reference lists.
#[async_trait]
pub trait ReferenceStore: Send + Sync {
    /// Replace the list under `key`.
    async fn put(&self, key: &str, references: &[VideoReference]) -> Result<()>;

    async fn get(&self, key: &str) -> Result<Option<StoredReferences>>;

    /// Append one reference, creating the key if needed. Returns the new length.
    async fn append(&self, key: &str, reference: &VideoReference) -> Result<usize>;

    async fn list_keys(&self) -> Result<Vec<String>>;
}

/// Final stage of a run: records what was produced.
#[derive(Clone)]
pub struct Publisher {
    store: Arc<dyn ReferenceStore>,
}

impl Publisher {
    pub fn new(store: Arc<dyn ReferenceStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn ReferenceStore> {
        &self.store
    }

    /// Store a series' clip references in prompt order.
    pub async fn publish_series(
        &self,
        series_id: &str,
        references: &[VideoReference],
    ) -> Result<()> {
        self.store.put(series_id, references).await?;
        info!("Published {} references under {}", references.len(), series_id);
        Ok(())
    }

    /// Add a finished video to a requester's history.
    pub async fn publish_final(
        &self,
        requester_id: &str,
        reference: &VideoReference,
    ) -> Result<usize> {
        let count = self.store.append(requester_id, reference).await?;
        info!("Published {} for {} ({} total)", reference, requester_id, count);
        Ok(count)
    }

    pub async fn lookup(&self, key: &str) -> Result<Option<StoredReferences>> {
        self.store.get(key).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publisher_series_and_final() {
        let publisher = Publisher::new(Arc::new(MemoryReferenceStore::new()));
        let clips = vec![VideoReference::new("gs://b/1.mp4"), VideoReference::new("gs://b/2.mp4")];

        publisher.publish_series("series-1", &clips).await.unwrap();
        let first = VideoReference::new("gs://b/final.mp4");
        let second = VideoReference::new("gs://b/final2.mp4");
        assert_eq!(publisher.publish_final("user-1", &first).await.unwrap(), 1);
        assert_eq!(publisher.publish_final("user-1", &second).await.unwrap(), 2);

        let series = publisher.lookup("series-1").await.unwrap().unwrap();
        assert_eq!(series.references, clips);
        assert!(publisher.lookup("missing").await.unwrap().is_none());
    }
}
