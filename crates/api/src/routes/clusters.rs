//! Route definitions for event clustering.
//!
//! ```text
//! /clusters/process            cluster a batch of events (POST)
//! ```

use axum::routing::post;
use axum::Router;

use crate::handlers::clusters;
use crate::state::AppState;

/// Clustering routes, nested at `/clusters`.
pub fn router() -> Router<AppState> {
    Router::new().route("/process", post(clusters::process_clusters))
}
