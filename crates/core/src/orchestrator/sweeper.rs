//! Throttled full-library sweeps.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::runner::ThemeOrchestrator;
use super::types::{BatchReport, SweepSummary};
use crate::source::{ShowSource, SourceError};

/// Runs the orchestrator over every show from a [`ShowSource`].
///
/// Requests are throttled on the leading edge: the first request runs, and
/// any request within the backoff window after it is dropped.
pub struct Sweeper {
    source: Arc<dyn ShowSource>,
    orchestrator: Arc<ThemeOrchestrator>,
    backoff: Duration,
    last_started: Mutex<Option<Instant>>,
    last_sweep: Mutex<Option<SweepSummary>>,
    running: AtomicBool,
    shutdown_tx: broadcast::Sender<()>,
}

impl Sweeper {
    pub fn new(
        source: Arc<dyn ShowSource>,
        orchestrator: Arc<ThemeOrchestrator>,
        backoff: Duration,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            source,
            orchestrator,
            backoff,
            last_started: Mutex::new(None),
            last_sweep: Mutex::new(None),
            running: AtomicBool::new(false),
            shutdown_tx,
        }
    }

    /// Sweeps unless one started within the backoff window.
    ///
    /// Returns `Ok(None)` when throttled.
    pub async fn request_sweep(&self) -> Result<Option<BatchReport>, SourceError> {
        if !self.try_begin() {
            debug!("Sweep requested within backoff window, ignoring");
            return Ok(None);
        }

        let started_at = Utc::now();
        *self.last_sweep.lock() = Some(SweepSummary {
            started_at,
            finished_at: None,
            report: None,
            error: None,
        });

        info!("Sweeping all shows");
        let result = self.sweep().await;

        let mut summary = SweepSummary {
            started_at,
            finished_at: Some(Utc::now()),
            report: None,
            error: None,
        };
        match &result {
            Ok(report) => summary.report = Some(report.clone()),
            Err(e) => {
                warn!("Sweep failed: {}", e);
                summary.error = Some(e.to_string());
            }
        }
        *self.last_sweep.lock() = Some(summary);

        result.map(Some)
    }

    async fn sweep(&self) -> Result<BatchReport, SourceError> {
        let shows = self.source.list_shows().await?;
        info!("Got {} shows from source", shows.len());
        Ok(self.orchestrator.process_shows(&shows).await)
    }

    fn try_begin(&self) -> bool {
        let mut last = self.last_started.lock();
        let now = Instant::now();
        if let Some(previous) = *last {
            if now.duration_since(previous) < self.backoff {
                return false;
            }
        }
        *last = Some(now);
        true
    }

    /// Most recent sweep, possibly still running.
    pub fn last_sweep(&self) -> Option<SweepSummary> {
        self.last_sweep.lock().clone()
    }

    /// Starts sweeping every `interval` in the background.
    pub fn start(self: &Arc<Self>, interval: Duration) {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Periodic sweep already running");
            return;
        }

        let sweeper = Arc::clone(self);
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            info!("Periodic sweep started (every {:?})", interval);
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!("Periodic sweep received shutdown signal");
                        break;
                    }
                    _ = tokio::time::sleep(interval) => {
                        if !sweeper.running.load(Ordering::Relaxed) {
                            break;
                        }
                        // Errors are recorded in the sweep summary.
                        let _ = sweeper.request_sweep().await;
                    }
                }
            }
            info!("Periodic sweep stopped");
        });
    }

    /// Stops the periodic sweep. A sweep in progress finishes on its own.
    pub fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        let _ = self.shutdown_tx.send(());
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::OrchestratorConfig;
    use crate::persistence::{DedupStore, SnapshotStorage, DEFAULT_FLUSH_INTERVAL};
    use crate::testing::{fixtures, MemorySnapshotStorage, MockShowSource};

    const BACKOFF: Duration = Duration::from_secs(30 * 60);

    fn sweeper(source: Arc<MockShowSource>) -> Arc<Sweeper> {
        let storage: Arc<dyn SnapshotStorage> = Arc::new(MemorySnapshotStorage::new());
        let dedup = DedupStore::new("theme-songs", storage, DEFAULT_FLUSH_INTERVAL);
        let orchestrator = Arc::new(ThemeOrchestrator::new(
            OrchestratorConfig::default(),
            Vec::new(),
            dedup,
        ));
        Arc::new(Sweeper::new(source, orchestrator, BACKOFF))
    }

    #[tokio::test(start_paused = true)]
    async fn test_leading_edge_throttle() {
        let source = Arc::new(MockShowSource::new());
        source.set_shows(vec![fixtures::show(1, "A", "/nonexistent/a", Some(1))]);
        let sweeper = sweeper(source.clone());

        let first = sweeper.request_sweep().await.unwrap().unwrap();
        assert_eq!(first.shows, 1);
        assert_eq!(first.missing_root, 1);

        tokio::time::advance(Duration::from_secs(60)).await;
        assert!(sweeper.request_sweep().await.unwrap().is_none());
        assert_eq!(source.list_count(), 1);

        tokio::time::advance(BACKOFF).await;
        assert!(sweeper.request_sweep().await.unwrap().is_some());
        assert_eq!(source.list_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_source_error_is_recorded() {
        let source = Arc::new(MockShowSource::new());
        source.set_next_error(SourceError::Parse("bad json".to_string()));
        let sweeper = sweeper(source);

        assert!(sweeper.request_sweep().await.is_err());
        let summary = sweeper.last_sweep().unwrap();
        assert!(summary.finished_at.is_some());
        assert!(summary.report.is_none());
        assert!(summary.error.unwrap().contains("bad json"));

        // A failed sweep still counts against the backoff.
        assert!(sweeper.request_sweep().await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_periodic_sweep() {
        let source = Arc::new(MockShowSource::new());
        let sweeper = sweeper(source.clone());

        sweeper.start(BACKOFF);
        assert!(sweeper.is_running());

        tokio::time::sleep(BACKOFF + Duration::from_secs(1)).await;
        assert_eq!(source.list_count(), 1);

        tokio::time::sleep(BACKOFF).await;
        assert_eq!(source.list_count(), 2);

        sweeper.stop();
        assert!(!sweeper.is_running());
        tokio::time::sleep(BACKOFF * 3).await;
        assert_eq!(source.list_count(), 2);
    }
}
