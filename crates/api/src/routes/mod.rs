pub mod clusters;
pub mod health;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /clusters/process                 cluster a batch of events (POST)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new().nest("/clusters", clusters::router())
}
