//! FIFO admission queue gated by a [`QuotaManager`].

use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::oneshot;
use tokio::time::{Duration, Instant};
use tracing::{debug, warn};

use super::quota::{Quota, QuotaManager};
use super::LimiterError;
use crate::metrics;

/// Delay before re-running the pump when the window is full and nothing is
/// active to trigger it.
const RETRY_DELAY: Duration = Duration::from_millis(100);

/// Snapshot of a scheduler for status reporting.
#[derive(Debug, Clone, Serialize)]
pub struct SchedulerStatus {
    pub service: String,
    pub active: u32,
    pub queued: usize,
    pub recent_admissions: usize,
    pub quota: Quota,
}

/// Admission-controlled task scheduler for one external service.
///
/// Tasks are admitted in submission order whenever the quota allows it.
/// Cloning is cheap and clones share the same queue and quota.
#[derive(Clone)]
pub struct AdmissionScheduler {
    inner: Arc<Inner>,
}

struct Inner {
    service: String,
    max_delay: Option<Duration>,
    state: Mutex<State>,
}

struct State {
    quota: QuotaManager,
    queue: VecDeque<oneshot::Sender<AdmissionSlot>>,
    retry_armed: bool,
}

/// An admitted slot. Dropping it releases the concurrency slot and wakes
/// the queue.
pub struct AdmissionSlot {
    inner: Weak<Inner>,
    armed: bool,
}

impl std::fmt::Debug for AdmissionSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdmissionSlot")
            .field("armed", &self.armed)
            .finish()
    }
}

impl Drop for AdmissionSlot {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if let Some(inner) = self.inner.upgrade() {
            inner.state.lock().quota.release();
            Inner::pump(&inner);
        }
    }
}

impl AdmissionScheduler {
    /// Creates a scheduler for `service` with the given quota.
    pub fn new(service: impl Into<String>, quota: Quota) -> Result<Self, LimiterError> {
        let max_delay = quota.max_delay();
        let quota = QuotaManager::new(quota)?;
        Ok(Self {
            inner: Arc::new(Inner {
                service: service.into(),
                max_delay,
                state: Mutex::new(State {
                    quota,
                    queue: VecDeque::new(),
                    retry_armed: false,
                }),
            }),
        })
    }

    /// Name of the service this scheduler guards.
    pub fn service(&self) -> &str {
        &self.inner.service
    }

    /// Runs `task` once admitted and returns its output.
    ///
    /// Fails with [`LimiterError::QueueTimeout`] if the task waited longer
    /// than the quota's `max_delay_ms`; the task is then never started. Once
    /// started, the task runs to completion regardless of the deadline.
    pub async fn submit<F, Fut, T>(&self, task: F) -> Result<T, LimiterError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let _slot = self.admit().await?;
        Ok(task().await)
    }

    /// Waits for admission and returns the slot guard.
    pub async fn admit(&self) -> Result<AdmissionSlot, LimiterError> {
        let queued_at = Instant::now();
        let (tx, mut rx) = oneshot::channel();
        self.inner.state.lock().queue.push_back(tx);
        Inner::pump(&self.inner);

        let slot = match self.inner.max_delay {
            None => rx.await.ok(),
            Some(max_delay) => match tokio::time::timeout(max_delay, &mut rx).await {
                Ok(result) => result.ok(),
                Err(_) => {
                    rx.close();
                    match rx.try_recv() {
                        // Admitted at the same moment the deadline fired.
                        Ok(slot) => Some(slot),
                        Err(_) => {
                            metrics::QUEUE_TIMEOUTS
                                .with_label_values(&[self.inner.service.as_str()])
                                .inc();
                            warn!(
                                "Task for {} dropped after waiting {:?} in queue",
                                self.inner.service, max_delay
                            );
                            Inner::pump(&self.inner);
                            return Err(LimiterError::QueueTimeout {
                                service: self.inner.service.clone(),
                                max_delay_ms: max_delay.as_millis() as u64,
                            });
                        }
                    }
                }
            },
        };

        let slot = slot.ok_or_else(|| LimiterError::Closed(self.inner.service.clone()))?;
        metrics::QUEUE_WAIT
            .with_label_values(&[self.inner.service.as_str()])
            .observe(queued_at.elapsed().as_secs_f64());
        Ok(slot)
    }

    /// Current scheduler state.
    pub fn status(&self) -> SchedulerStatus {
        let mut state = self.inner.state.lock();
        state.quota.prune_at(Instant::now());
        SchedulerStatus {
            service: self.inner.service.clone(),
            active: state.quota.active_count(),
            queued: state.queue.iter().filter(|tx| !tx.is_closed()).count(),
            recent_admissions: state.quota.history_len(),
            quota: state.quota.quota().clone(),
        }
    }
}

impl Inner {
    /// Admits queued tasks while the quota allows.
    fn pump(inner: &Arc<Inner>) {
        let mut state = inner.state.lock();

        loop {
            while state.queue.front().is_some_and(|tx| tx.is_closed()) {
                state.queue.pop_front();
            }
            if state.queue.is_empty() || !state.quota.try_admit() {
                break;
            }
            let Some(tx) = state.queue.pop_front() else {
                break;
            };

            let slot = AdmissionSlot {
                inner: Arc::downgrade(inner),
                armed: true,
            };
            if let Err(mut slot) = tx.send(slot) {
                // Waiter gave up between the check and the send.
                slot.armed = false;
                state.quota.release();
                continue;
            }
            metrics::ADMISSIONS
                .with_label_values(&[inner.service.as_str()])
                .inc();
        }

        let stalled = !state.queue.is_empty() && state.quota.active_count() == 0;
        if stalled && !state.retry_armed {
            let Ok(handle) = tokio::runtime::Handle::try_current() else {
                return;
            };
            state.retry_armed = true;
            debug!("{} rate limited, retrying in {:?}", inner.service, RETRY_DELAY);

            let weak = Arc::downgrade(inner);
            handle.spawn(async move {
                tokio::time::sleep(RETRY_DELAY).await;
                if let Some(inner) = weak.upgrade() {
                    inner.state.lock().retry_armed = false;
                    Inner::pump(&inner);
                }
            });
        }
    }
}
