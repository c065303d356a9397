//! Dedup store maintenance.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use super::webhook::ErrorResponse;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct ClearResponse {
    pub key: String,
    /// False when the key was not marked
    pub cleared: bool,
}

/// Forget that a show is satisfied so the next webhook or sweep fetches its
/// themes again. `key` is the show's dedup key (its TVDB id when known).
pub async fn clear_satisfied(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
) -> Result<Json<ClearResponse>, (StatusCode, Json<ErrorResponse>)> {
    match state.orchestrator().dedup().clear(&key).await {
        Ok(cleared) => {
            info!("Cleared satisfied mark for {} (was set: {})", key, cleared);
            Ok(Json(ClearResponse { key, cleared }))
        }
        Err(e) => {
            warn!("Failed to clear satisfied mark for {}: {}", key, e);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: e.to_string(),
                }),
            ))
        }
    }
}
