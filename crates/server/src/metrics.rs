//! Prometheus metrics for observability.
//!
//! This module provides metrics for monitoring the showtunes server:
//! - HTTP request metrics (latency, counts)
//! - Scheduler queues and in-flight shows (collected dynamically)
//! - Core counters registered from `showtunes_core::metrics`

use once_cell::sync::Lazy;
use prometheus::{
    self, Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, IntGaugeVec, Opts,
    Registry, TextEncoder,
};
use tracing::warn;

use crate::state::AppState;

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

// =============================================================================
// HTTP Request Metrics
// =============================================================================

/// HTTP request duration in seconds.
pub static HTTP_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "showtunes_http_request_duration_seconds",
            "HTTP request duration in seconds",
        )
        .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests total count.
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("showtunes_http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests currently in flight.
pub static HTTP_REQUESTS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "showtunes_http_requests_in_flight",
        "Number of HTTP requests currently being processed",
    )
    .unwrap()
});

// =============================================================================
// Scheduler Metrics (collected dynamically)
// =============================================================================

/// Tasks currently holding an admission slot.
pub static SCHEDULER_ACTIVE: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new("showtunes_scheduler_active", "Tasks currently admitted"),
        &["service"],
    )
    .unwrap()
});

/// Tasks waiting for admission.
pub static SCHEDULER_QUEUED: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new("showtunes_scheduler_queued", "Tasks waiting for admission"),
        &["service"],
    )
    .unwrap()
});

// =============================================================================
// Orchestrator Metrics (collected dynamically)
// =============================================================================

/// Shows currently being processed.
pub static SHOWS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "showtunes_shows_in_flight",
        "Number of shows currently being processed",
    )
    .unwrap()
});

/// Periodic sweep state (1 = running, 0 = stopped).
pub static SWEEPER_RUNNING: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "showtunes_sweeper_running",
        "Whether the periodic sweep is running (1) or stopped (0)",
    )
    .unwrap()
});

// =============================================================================
// Registration
// =============================================================================

fn register_metrics(registry: &Registry) {
    // HTTP
    registry
        .register(Box::new(HTTP_REQUEST_DURATION.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_IN_FLIGHT.clone()))
        .unwrap();

    // Schedulers and orchestrator
    registry
        .register(Box::new(SCHEDULER_ACTIVE.clone()))
        .unwrap();
    registry
        .register(Box::new(SCHEDULER_QUEUED.clone()))
        .unwrap();
    registry
        .register(Box::new(SHOWS_IN_FLIGHT.clone()))
        .unwrap();
    registry
        .register(Box::new(SWEEPER_RUNNING.clone()))
        .unwrap();

    // Core metrics (schedulers, orchestrator, dedup store)
    for metric in showtunes_core::metrics::all_metrics() {
        registry.register(metric).unwrap();
    }
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        warn!("Failed to encode metrics: {}", e);
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

/// Collect dynamic metrics from current application state.
///
/// Called before encoding so gauges reflect the schedulers and the
/// orchestrator at scrape time.
pub fn collect_dynamic_metrics(state: &AppState) {
    for status in state.schedulers().statuses() {
        SCHEDULER_ACTIVE
            .with_label_values(&[status.service.as_str()])
            .set(status.active as i64);
        SCHEDULER_QUEUED
            .with_label_values(&[status.service.as_str()])
            .set(status.queued as i64);
    }

    SHOWS_IN_FLIGHT.set(state.orchestrator().in_flight().len() as i64);

    let running = state.sweeper().map(|s| s.is_running()).unwrap_or(false);
    SWEEPER_RUNNING.set(if running { 1 } else { 0 });
}
