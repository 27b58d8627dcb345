//! Health check HTTP route handlers
//!
//! - `GET /health` - Simple liveness check (returns 200 OK)
//! - `GET /health/live` - Liveness probe
//! - `GET /health/ready` - Readiness with room and connection counts

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde::Serialize;
use std::sync::Arc;

use crate::services::TurnCoordinator;

/// Shared application state for health check handlers
#[derive(Clone)]
pub struct HealthState {
    pub coordinator: Arc<TurnCoordinator>,
    /// Name of the configured card source
    pub catalog: &'static str,
}

impl HealthState {
    pub fn new(coordinator: Arc<TurnCoordinator>, catalog: &'static str) -> Self {
        Self {
            coordinator,
            catalog,
        }
    }
}

/// Create health check router
pub fn health_router(state: HealthState) -> Router {
    Router::new()
        .route("/", get(simple_health))
        .route("/live", get(liveness_probe))
        .route("/ready", get(readiness_probe))
        .with_state(state)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadinessResponse {
    pub status: &'static str,
    pub catalog: &'static str,
    pub rooms: usize,
    pub connections: usize,
}

/// Simple health check - always returns OK if the server is running
async fn simple_health() -> &'static str {
    "OK"
}

/// Liveness probe
///
/// Does not look at game state, only that the process answers.
async fn liveness_probe() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "alive",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Readiness probe
///
/// # Response
/// - 200 OK when a card source is configured
/// - 503 Service Unavailable otherwise
async fn readiness_probe(State(state): State<HealthState>) -> impl IntoResponse {
    let ready = state.catalog != "unconfigured";
    let response = ReadinessResponse {
        status: if ready { "ready" } else { "degraded" },
        catalog: state.catalog,
        rooms: state.coordinator.registry().room_count(),
        connections: state.coordinator.broadcaster().total_connections(),
    };

    let status_code = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(response))
}
