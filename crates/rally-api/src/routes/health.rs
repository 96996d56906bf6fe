//! Health check endpoint.

use axum::extract::State;
use axum::{Json, Router, routing::get};
use rally_events::domain::outcomes::StartupReport;
use serde::Serialize;

use crate::state::AppState;

/// Health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    /// Service status.
    pub status: String,
    /// Service version.
    pub version: String,
    /// Whether startup recovery has finished and the scheduler is ticking.
    pub ready: bool,
    /// What startup recovery resumed, discarded or failed to read.
    pub startup: Option<StartupReport>,
}

/// GET /health
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        ready: state.engine.is_ready(),
        startup: state.engine.startup_report(),
    })
}

/// Returns the health check router.
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
