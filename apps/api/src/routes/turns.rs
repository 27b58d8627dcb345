//! Turn action REST route handlers
//!
//! - `POST /api/turn/confirm` - Resolve the current placement
//! - `POST /api/turn/advance` - Move from result to the next turn
//! - `POST /api/turn/play-started` - Open the placement window

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::error::{ApiError, ApiResult};
use crate::services::{ConfirmPlacement, TurnCoordinator};

/// Shared state for turn handlers
#[derive(Clone)]
pub struct TurnsState {
    pub coordinator: Arc<TurnCoordinator>,
}

impl TurnsState {
    pub fn new(coordinator: Arc<TurnCoordinator>) -> Self {
        Self { coordinator }
    }
}

/// Create turn router
pub fn turns_router(state: TurnsState) -> Router {
    Router::new()
        .route("/confirm", post(confirm))
        .route("/advance", post(advance))
        .route("/play-started", post(play_started))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvanceRequest {
    pub room_code: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayStartedRequest {
    pub room_code: String,
    pub host_id: String,
    pub turn_id: String,
}

/// Confirm a placement
///
/// # Response
/// - 200 OK: `{correct, newScore?, finalIndex}`
/// - 403 Forbidden: caller is the host
/// - 404 Not Found: unknown room or player
/// - 409 Conflict: stale turn, wrong player or wrong phase
async fn confirm(
    State(state): State<TurnsState>,
    payload: Result<Json<ConfirmPlacement>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(request) = payload.map_err(ApiError::from)?;
    let result = state.coordinator.confirm_placement(&request).await?;
    Ok(Json(result))
}

/// Advance to the next turn
///
/// # Response
/// - 204 No Content
/// - 400 Bad Request: malformed body
/// - 409 Conflict: the turn has not been resolved
async fn advance(
    State(state): State<TurnsState>,
    payload: Result<Json<AdvanceRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(request) = payload.map_err(ApiError::from)?;
    state.coordinator.advance_turn(&request.room_code).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Record that the host device is playing the drawn song
///
/// # Response
/// - 204 No Content
/// - 400 Bad Request: malformed body
/// - 403 Forbidden: caller is not the host
/// - 409 Conflict: stale or resolved turn
async fn play_started(
    State(state): State<TurnsState>,
    payload: Result<Json<PlayStartedRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(request) = payload.map_err(ApiError::from)?;
    state
        .coordinator
        .mark_play_started(&request.room_code, &request.host_id, &request.turn_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
