//! Health check endpoints.

use crate::state::AppState;
use axum::{Router, routing::get};

/// Registers health check routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}

/// Liveness probe; the exporter is healthy as long as it can answer.
async fn health_check() -> &'static str {
    "OK"
}
