//! Status API handler.

use axum::{extract::State, Json};
use serde::Serialize;
use std::sync::Arc;

use showtunes_core::{SchedulerStatus, SweepSummary};

use crate::state::AppState;

// ============================================================================
// Response Types
// ============================================================================

/// Overall status response
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    /// Providers in fallback order
    pub providers: Vec<String>,
    pub schedulers: Vec<SchedulerStatus>,
    /// Shows currently being processed
    pub in_flight: usize,
    /// Whether the dedup store has been read from disk yet
    pub store_loaded: bool,
    pub sweeper: SweeperStatus,
}

/// Sweep state
#[derive(Debug, Serialize)]
pub struct SweeperStatus {
    /// Whether a show source is configured
    pub available: bool,
    /// Whether the periodic sweep is running
    pub running: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_sweep: Option<SweepSummary>,
}

// ============================================================================
// Handlers
// ============================================================================

/// Get scheduler, orchestrator and sweep status
pub async fn get_status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    let orchestrator = state.orchestrator();

    let sweeper = match state.sweeper() {
        Some(sweeper) => SweeperStatus {
            available: true,
            running: sweeper.is_running(),
            last_sweep: sweeper.last_sweep(),
        },
        None => SweeperStatus {
            available: false,
            running: false,
            last_sweep: None,
        },
    };

    Json(StatusResponse {
        providers: orchestrator.provider_names(),
        schedulers: state.schedulers().statuses(),
        in_flight: orchestrator.in_flight().len(),
        store_loaded: orchestrator.dedup().snapshot().is_loaded(),
        sweeper,
    })
}
