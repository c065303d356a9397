//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Admission schedulers (admissions, queue timeouts, queue wait)
//! - Orchestrator (show outcomes, resource fetches, provider errors)
//! - Dedup store (flushes)

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, Opts};

// =============================================================================
// Admission Schedulers
// =============================================================================

/// Tasks admitted by service.
pub static ADMISSIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("showtunes_admissions_total", "Tasks admitted by scheduler"),
        &["service"],
    )
    .unwrap()
});

/// Tasks rejected after exceeding the maximum queue wait.
pub static QUEUE_TIMEOUTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "showtunes_queue_timeouts_total",
            "Tasks rejected after waiting too long in a scheduler queue",
        ),
        &["service"],
    )
    .unwrap()
});

/// Time spent queued before admission.
pub static QUEUE_WAIT: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "showtunes_queue_wait_seconds",
            "Time tasks spent queued before admission",
        )
        .buckets(vec![0.001, 0.01, 0.1, 0.5, 1.0, 5.0, 15.0, 60.0, 300.0]),
        &["service"],
    )
    .unwrap()
});

// =============================================================================
// Orchestrator
// =============================================================================

/// Show runs by outcome.
pub static SHOWS_PROCESSED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("showtunes_shows_processed_total", "Show runs by outcome"),
        &["outcome"], // "in_flight", "missing_root", "already_satisfied", "completed", "unresolved", "error"
    )
    .unwrap()
});

/// Resource fetches by provider and result.
pub static RESOURCES_FETCHED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "showtunes_resources_fetched_total",
            "Resource fetches by provider and result",
        ),
        &["provider", "result"], // result: "written", "skipped", "failed"
    )
    .unwrap()
});

/// Provider discovery errors.
pub static PROVIDER_ERRORS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "showtunes_provider_errors_total",
            "Provider discovery failures treated as empty results",
        ),
        &["provider"],
    )
    .unwrap()
});

// =============================================================================
// Persistence
// =============================================================================

/// Store flushes by store name and result.
pub static STORE_FLUSHES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("showtunes_store_flushes_total", "Store snapshot flushes"),
        &["store", "result"], // result: "ok", "error"
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Schedulers
        Box::new(ADMISSIONS.clone()),
        Box::new(QUEUE_TIMEOUTS.clone()),
        Box::new(QUEUE_WAIT.clone()),
        // Orchestrator
        Box::new(SHOWS_PROCESSED.clone()),
        Box::new(RESOURCES_FETCHED.clone()),
        Box::new(PROVIDER_ERRORS.clone()),
        // Persistence
        Box::new(STORE_FLUSHES.clone()),
    ]
}
