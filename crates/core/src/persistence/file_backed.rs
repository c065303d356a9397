//! Lazily loaded, periodically flushed snapshot of a serde value.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::{OnceCell, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant, MissedTickBehavior};
use tracing::{debug, error, info};

use super::storage::SnapshotStorage;
use super::StoreError;
use crate::metrics;

/// How often a loaded store is written back to disk.
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(15 * 60);

/// A value of type `S` persisted as a JSON snapshot.
///
/// The first [`get`](Self::get) reads the snapshot; concurrent first calls
/// share that single read. Callers mutate the returned handle directly and
/// the background flusher persists it every flush interval. Mutations made
/// after the last flush are lost on a crash; [`flush`](Self::flush) must be
/// awaited on graceful shutdown.
pub struct FileBacked<S> {
    inner: Arc<Inner<S>>,
}

impl<S> Clone for FileBacked<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct Inner<S> {
    name: String,
    storage: Arc<dyn SnapshotStorage>,
    default: S,
    flush_interval: Duration,
    value: OnceCell<Arc<RwLock<S>>>,
    flush_lock: tokio::sync::Mutex<()>,
    flusher: Mutex<Option<JoinHandle<()>>>,
}

impl<S> FileBacked<S>
where
    S: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    /// Creates a store called `name`; `default` is used when no snapshot exists.
    pub fn new(
        name: impl Into<String>,
        storage: Arc<dyn SnapshotStorage>,
        default: S,
        flush_interval: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                name: name.into(),
                storage,
                default,
                flush_interval,
                value: OnceCell::new(),
                flush_lock: tokio::sync::Mutex::new(()),
                flusher: Mutex::new(None),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Whether the snapshot has been loaded.
    pub fn is_loaded(&self) -> bool {
        self.inner.value.initialized()
    }

    /// Returns the shared in-memory value, loading it on first use.
    ///
    /// A missing snapshot yields the default; an undecodable one is an error
    /// and the next call tries again.
    pub async fn get(&self) -> Result<Arc<RwLock<S>>, StoreError> {
        let value = self
            .inner
            .value
            .get_or_try_init(|| Inner::load(&self.inner))
            .await?;
        Ok(Arc::clone(value))
    }

    /// Writes the current value to storage. No-op if never loaded.
    pub async fn flush(&self) -> Result<(), StoreError> {
        Inner::flush(&self.inner).await
    }

    /// Stops the background flusher.
    pub fn stop(&self) {
        if let Some(handle) = self.inner.flusher.lock().take() {
            handle.abort();
        }
    }
}

impl<S> Inner<S>
where
    S: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    async fn load(inner: &Arc<Inner<S>>) -> Result<Arc<RwLock<S>>, StoreError> {
        info!("Persistence: reading {}", inner.name);

        let value = match inner.storage.read(&inner.name).await? {
            Some(bytes) => serde_json::from_slice(&bytes).map_err(|e| StoreError::Corrupt {
                name: inner.name.clone(),
                reason: e.to_string(),
            })?,
            None => {
                debug!("Persistence: no snapshot for {}, using default", inner.name);
                inner.default.clone()
            }
        };

        Self::spawn_flusher(inner);
        Ok(Arc::new(RwLock::new(value)))
    }

    fn spawn_flusher(inner: &Arc<Inner<S>>) {
        let weak: Weak<Inner<S>> = Arc::downgrade(inner);
        let period = inner.flush_interval;

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                if let Err(e) = Self::flush(&inner).await {
                    error!("Periodic flush of {} failed: {}", inner.name, e);
                }
            }
        });

        if let Some(previous) = inner.flusher.lock().replace(handle) {
            previous.abort();
        }
    }

    async fn flush(inner: &Arc<Inner<S>>) -> Result<(), StoreError> {
        let Some(value) = inner.value.get() else {
            return Ok(());
        };

        let _serialized = inner.flush_lock.lock().await;
        info!("Persistence: flushing {}", inner.name);

        let bytes = {
            let snapshot = value.read().await;
            serde_json::to_vec(&*snapshot).map_err(|e| StoreError::Serialize {
                name: inner.name.clone(),
                reason: e.to_string(),
            })?
        };

        let result = inner.storage.write(&inner.name, &bytes).await;
        let label = if result.is_ok() { "ok" } else { "error" };
        metrics::STORE_FLUSHES
            .with_label_values(&[inner.name.as_str(), label])
            .inc();
        result
    }
}

impl<S> Drop for Inner<S> {
    fn drop(&mut self) {
        if let Some(handle) = self.flusher.get_mut().take() {
            handle.abort();
        }
    }
}
