//! Sonarr webhook and sweep trigger handlers.
//!
//! Both respond immediately; the work runs on spawned tasks so Sonarr's
//! webhook call never waits on provider downloads.

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use showtunes_core::{Show, SonarrEventType, SonarrWebhook, Sweeper, ThemeOrchestrator};

use crate::state::AppState;

/// Webhook accepted response
#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    pub event_type: SonarrEventType,
    /// Shows queued for processing by this event
    pub queued: usize,
    /// Whether a (throttled) full sweep was requested
    pub sweep_requested: bool,
}

/// Sweep trigger response
#[derive(Debug, Serialize)]
pub struct SweepResponse {
    pub message: String,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Receive a Sonarr webhook event.
///
/// `Download` events process their series right away. Every event also
/// requests a full sweep, which the sweeper drops inside its backoff window.
pub async fn sonarr_webhook(
    State(state): State<Arc<AppState>>,
    Json(event): Json<SonarrWebhook>,
) -> (StatusCode, Json<WebhookResponse>) {
    debug!("Received Sonarr {:?} event", event.event_type);

    let mut queued = 0;
    if event.event_type == SonarrEventType::Download {
        match event.series {
            Some(show) => {
                spawn_show(Arc::clone(state.orchestrator()), show);
                queued = 1;
            }
            None => warn!("Download event without a series, nothing to process"),
        }
    }

    let sweep_requested = match state.sweeper() {
        Some(sweeper) => {
            spawn_sweep(Arc::clone(sweeper));
            true
        }
        None => false,
    };

    (
        StatusCode::ACCEPTED,
        Json(WebhookResponse {
            event_type: event.event_type,
            queued,
            sweep_requested,
        }),
    )
}

/// Request a full sweep of the library
pub async fn request_sweep(
    State(state): State<Arc<AppState>>,
) -> Result<(StatusCode, Json<SweepResponse>), (StatusCode, Json<ErrorResponse>)> {
    match state.sweeper() {
        Some(sweeper) => {
            spawn_sweep(Arc::clone(sweeper));
            Ok((
                StatusCode::ACCEPTED,
                Json(SweepResponse {
                    message: "Sweep requested".to_string(),
                }),
            ))
        }
        None => Err((
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ErrorResponse {
                error: "Sweeps not available. Check that sonarr is configured.".to_string(),
            }),
        )),
    }
}

fn spawn_show(orchestrator: Arc<ThemeOrchestrator>, show: Show) {
    tokio::spawn(async move {
        match orchestrator.process_show(&show).await {
            Ok(outcome) => info!("{}: {}", show.title, outcome.label()),
            Err(e) => warn!("{}: {}", show.title, e),
        }
    });
}

fn spawn_sweep(sweeper: Arc<Sweeper>) {
    tokio::spawn(async move {
        // Failures are logged and recorded by the sweeper itself.
        if let Ok(Some(report)) = sweeper.request_sweep().await {
            info!("Sweep finished: {:?}", report);
        }
    });
}
