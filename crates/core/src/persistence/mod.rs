//! Durable key/value snapshots.
//!
//! A [`FileBacked`] value is loaded lazily on first access, cached in memory,
//! flushed periodically in the background and once more on shutdown. The
//! [`DedupStore`] built on top records which shows need no further work.

mod dedup;
mod file_backed;
mod storage;

pub use dedup::{DedupRecord, DedupStore};
pub use file_backed::{FileBacked, DEFAULT_FLUSH_INTERVAL};
pub use storage::{FsSnapshotStorage, SnapshotStorage};

use thiserror::Error;

/// Errors that can occur while loading or flushing a store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Reading or writing the snapshot failed.
    #[error("I/O error on store {name}: {source}")]
    Io {
        name: String,
        #[source]
        source: std::io::Error,
    },

    /// The snapshot exists but cannot be decoded.
    #[error("Store {name} is corrupt: {reason}")]
    Corrupt { name: String, reason: String },

    /// The in-memory value could not be encoded.
    #[error("Failed to serialize store {name}: {reason}")]
    Serialize { name: String, reason: String },
}

impl StoreError {
    pub(crate) fn io(name: &str, source: std::io::Error) -> Self {
        Self::Io {
            name: name.to_string(),
            source,
        }
    }
}
