//! In-memory snapshot storage for testing.

use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::persistence::{SnapshotStorage, StoreError};

/// Snapshot storage backed by a map.
///
/// Counts reads and writes, can delay reads to widen race windows, and can
/// be told to fail writes.
#[derive(Debug, Default)]
pub struct MemorySnapshotStorage {
    files: Mutex<HashMap<String, Vec<u8>>>,
    reads: AtomicUsize,
    writes: AtomicUsize,
    read_delay: Duration,
    fail_writes: AtomicBool,
}

impl MemorySnapshotStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every read take `delay`.
    pub fn with_read_delay(mut self, delay: Duration) -> Self {
        self.read_delay = delay;
        self
    }

    /// Seed a snapshot.
    pub fn insert(&self, name: &str, bytes: Vec<u8>) {
        self.files.lock().insert(name.to_string(), bytes);
    }

    /// Current bytes of a snapshot.
    pub fn contents(&self, name: &str) -> Option<Vec<u8>> {
        self.files.lock().get(name).cloned()
    }

    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl SnapshotStorage for MemorySnapshotStorage {
    async fn read(&self, name: &str) -> Result<Option<Vec<u8>>, StoreError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if !self.read_delay.is_zero() {
            tokio::time::sleep(self.read_delay).await;
        }
        Ok(self.contents(name))
    }

    async fn write(&self, name: &str, bytes: &[u8]) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::io(
                name,
                io::Error::new(io::ErrorKind::Other, "simulated write failure"),
            ));
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.insert(name, bytes.to_vec());
        Ok(())
    }
}
