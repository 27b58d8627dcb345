//! Playback REST route handlers
//!
//! - `POST /api/playback/queue-next` - Get the drawn song playing on the host device

use axum::{
    extract::{rejection::JsonRejection, State},
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use std::sync::Arc;

use crate::error::{ApiError, ApiResult};
use crate::services::{QueueNextRequest, TurnCoordinator};

/// Shared state for playback handlers
#[derive(Clone)]
pub struct PlaybackState {
    pub coordinator: Arc<TurnCoordinator>,
}

impl PlaybackState {
    pub fn new(coordinator: Arc<TurnCoordinator>) -> Self {
        Self { coordinator }
    }
}

/// Create playback router
pub fn playback_router(state: PlaybackState) -> Router {
    Router::new()
        .route("/queue-next", post(queue_next))
        .with_state(state)
}

/// Queue and confirm the current song
///
/// # Response
/// - 200 OK: `{status: "reconciled", via}`, `{status: "duplicate"}` or `{status: "unconfirmed"}`
/// - 400 Bad Request: missing device id
/// - 403 Forbidden: caller is not the host
/// - 409 Conflict: stale turn
/// - 502 Bad Gateway: device transfer failed
async fn queue_next(
    State(state): State<PlaybackState>,
    payload: Result<Json<QueueNextRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(request) = payload.map_err(ApiError::from)?;
    let outcome = state.coordinator.queue_next(&request).await?;
    Ok(Json(outcome))
}
