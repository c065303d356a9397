//! Record of shows that need no further work.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::time::Duration;

use super::file_backed::FileBacked;
use super::storage::SnapshotStorage;
use super::StoreError;

/// Entity key to "satisfied" flag.
pub type DedupRecord = HashMap<String, bool>;

/// Durable set of satisfied entities.
#[derive(Clone)]
pub struct DedupStore {
    store: FileBacked<DedupRecord>,
}

impl DedupStore {
    pub fn new(name: impl Into<String>, storage: Arc<dyn SnapshotStorage>, flush_interval: Duration) -> Self {
        Self {
            store: FileBacked::new(name, storage, DedupRecord::new(), flush_interval),
        }
    }

    /// The underlying snapshot.
    pub fn snapshot(&self) -> &FileBacked<DedupRecord> {
        &self.store
    }

    pub async fn is_satisfied(&self, key: &str) -> Result<bool, StoreError> {
        let record = self.store.get().await?;
        let satisfied = record.read().await.get(key).copied().unwrap_or(false);
        Ok(satisfied)
    }

    pub async fn mark_satisfied(&self, key: &str) -> Result<(), StoreError> {
        let record = self.store.get().await?;
        record.write().await.insert(key.to_string(), true);
        Ok(())
    }

    /// Forgets `key` so the next run works on it again.
    pub async fn clear(&self, key: &str) -> Result<bool, StoreError> {
        let record = self.store.get().await?;
        let removed = record.write().await.remove(key).is_some();
        Ok(removed)
    }

    /// Number of satisfied entities.
    pub async fn satisfied_count(&self) -> Result<usize, StoreError> {
        let record = self.store.get().await?;
        let count = record.read().await.values().filter(|v| **v).count();
        Ok(count)
    }

    pub async fn flush(&self) -> Result<(), StoreError> {
        self.store.flush().await
    }

    pub fn stop(&self) {
        self.store.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::{FsSnapshotStorage, DEFAULT_FLUSH_INTERVAL};
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_mark_and_query() {
        let temp = TempDir::new().unwrap();
        let storage = Arc::new(FsSnapshotStorage::new(temp.path()));
        let store = DedupStore::new("theme-songs", storage, DEFAULT_FLUSH_INTERVAL);

        assert!(!store.is_satisfied("81189").await.unwrap());
        store.mark_satisfied("81189").await.unwrap();
        assert!(store.is_satisfied("81189").await.unwrap());
        assert_eq!(store.satisfied_count().await.unwrap(), 1);

        assert!(store.clear("81189").await.unwrap());
        assert!(!store.clear("81189").await.unwrap());
        assert!(!store.is_satisfied("81189").await.unwrap());
    }

    #[tokio::test]
    async fn test_survives_reopen() {
        let temp = TempDir::new().unwrap();
        let storage: Arc<dyn SnapshotStorage> = Arc::new(FsSnapshotStorage::new(temp.path()));

        let store = DedupStore::new("theme-songs", Arc::clone(&storage), DEFAULT_FLUSH_INTERVAL);
        store.mark_satisfied("1").await.unwrap();
        store.flush().await.unwrap();

        let reopened = DedupStore::new("theme-songs", storage, DEFAULT_FLUSH_INTERVAL);
        assert!(reopened.is_satisfied("1").await.unwrap());
        assert!(!reopened.is_satisfied("2").await.unwrap());
    }
}
