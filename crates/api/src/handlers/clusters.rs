//! Handlers for event clustering.
//!
//! Requests are validated at the boundary, then the CPU-bound engine runs on
//! the blocking pool so it does not stall the async workers.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use geocluster_core::engine::{self, ClusteringResult};
use geocluster_core::error::CoreError;
use geocluster_core::input::{self, RawEvent};
use geocluster_core::quality::{self, QualityReport};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, Validate)]
pub struct ProcessClustersRequest {
    #[validate(length(min = 1, message = "At least one event is required"))]
    pub events: Vec<RawEvent>,
    #[validate(range(min = 1, message = "k must be at least 1"))]
    pub k: Option<usize>,
    #[validate(range(min = 1, message = "min_cluster_size must be at least 1"))]
    pub min_cluster_size: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct ProcessClustersResponse {
    pub result: ClusteringResult,
    pub quality: QualityReport,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /api/v1/clusters/process
///
/// Cluster a batch of events. `k` and `min_cluster_size` fall back to the
/// server defaults when omitted.
pub async fn process_clusters(
    State(state): State<AppState>,
    payload: Result<Json<ProcessClustersRequest>, JsonRejection>,
) -> AppResult<impl IntoResponse> {
    let Json(body) = payload?;
    body.validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let max_events = state.config.max_events;
    if body.events.len() > max_events {
        return Err(AppError::BadRequest(format!(
            "Too many events: {} exceeds the limit of {max_events}",
            body.events.len()
        )));
    }

    let k = body.k.unwrap_or(state.config.default_k);
    let min_cluster_size = body
        .min_cluster_size
        .unwrap_or(state.config.default_min_cluster_size);
    let events = input::validate_events(body.events)?;

    tracing::debug!(events = events.len(), k, min_cluster_size, "Processing clusters");

    let outcome = tokio::task::spawn_blocking(move || -> Result<_, CoreError> {
        let result = engine::process(&events, k, min_cluster_size)?;
        let quality = quality::analyze(&events, &result);
        Ok(ProcessClustersResponse { result, quality })
    })
    .await
    .map_err(|e| AppError::InternalError(format!("Clustering task failed: {e}")))??;

    if !outcome.result.is_complete {
        tracing::warn!(
            missing_events = outcome.result.missing_events,
            "Returning incomplete clustering result"
        );
    }

    Ok(Json(DataResponse { data: outcome }))
}
