//! Where snapshots live.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;

use super::StoreError;

/// Byte-level storage for named snapshots.
#[async_trait]
pub trait SnapshotStorage: Send + Sync {
    /// Reads the snapshot called `name`, or `None` if it does not exist.
    async fn read(&self, name: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Replaces the snapshot called `name`.
    async fn write(&self, name: &str, bytes: &[u8]) -> Result<(), StoreError>;
}

/// Stores each snapshot as `<dir>/<name>`.
#[derive(Debug, Clone)]
pub struct FsSnapshotStorage {
    dir: PathBuf,
}

impl FsSnapshotStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    async fn ensure_dir(&self, name: &str) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| StoreError::io(name, e))
    }
}

#[async_trait]
impl SnapshotStorage for FsSnapshotStorage {
    async fn read(&self, name: &str) -> Result<Option<Vec<u8>>, StoreError> {
        self.ensure_dir(name).await?;

        match fs::read(self.dir.join(name)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::io(name, e)),
        }
    }

    async fn write(&self, name: &str, bytes: &[u8]) -> Result<(), StoreError> {
        self.ensure_dir(name).await?;

        // Write next to the target and rename so readers never see half a snapshot.
        let target = self.dir.join(name);
        let staging = self.dir.join(format!(".{}.tmp", name));
        fs::write(&staging, bytes)
            .await
            .map_err(|e| StoreError::io(name, e))?;
        fs::rename(&staging, &target)
            .await
            .map_err(|e| StoreError::io(name, e))
    }
}
