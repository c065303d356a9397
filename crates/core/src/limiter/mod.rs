//! Quota-based admission control for rate-limited external services.
//!
//! Each external service gets an [`AdmissionScheduler`]: a FIFO queue gated
//! by a [`QuotaManager`] that enforces a sliding-window rate limit and a
//! concurrency ceiling. Queued tasks can carry a deadline after which they
//! are rejected without ever being started.

mod quota;
mod registry;
mod scheduler;

pub use quota::{Quota, QuotaManager};
pub use registry::Schedulers;
pub use scheduler::{AdmissionScheduler, AdmissionSlot, SchedulerStatus};

use thiserror::Error;

/// Errors produced by the limiter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LimiterError {
    /// Quota configuration is inconsistent.
    #[error("Invalid quota: {0}")]
    InvalidQuota(String),

    /// Task waited in the queue longer than the quota allows.
    #[error("Queue wait for {service} exceeded {max_delay_ms} ms")]
    QueueTimeout { service: String, max_delay_ms: u64 },

    /// No scheduler configured for the service.
    #[error("No scheduler configured for service: {0}")]
    UnknownService(String),

    /// Scheduler went away while the task was queued.
    #[error("Scheduler for {0} closed")]
    Closed(String),
}
