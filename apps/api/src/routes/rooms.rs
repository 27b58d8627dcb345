//! Room lifecycle REST route handlers
//!
//! - `POST /api/rooms` - Create a room
//! - `GET /api/create-room?targetPoints=` - Create a room (query form)
//! - `GET /api/rooms/:code` - Current room snapshot

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::error::{ApiError, ApiResult};
use crate::services::TurnCoordinator;

/// Shared state for room handlers
#[derive(Clone)]
pub struct RoomsState {
    pub coordinator: Arc<TurnCoordinator>,
    /// Target used when the request does not name one
    pub default_target_points: u32,
}

impl RoomsState {
    pub fn new(coordinator: Arc<TurnCoordinator>, default_target_points: u32) -> Self {
        Self {
            coordinator,
            default_target_points,
        }
    }
}

/// Create room router
pub fn rooms_router(state: RoomsState) -> Router {
    Router::new()
        .route("/rooms", post(create_room))
        .route("/create-room", get(create_room_query))
        .route("/rooms/:code", get(get_room))
        .with_state(state)
}

/// Body of `POST /api/rooms`
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoomRequest {
    #[serde(default)]
    pub host_id: Option<String>,
    #[serde(default)]
    pub target_points: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoomQuery {
    #[serde(default)]
    pub target_points: Option<String>,
    #[serde(default)]
    pub host_id: Option<String>,
}

/// Create a room
///
/// # Response
/// - 201 Created: `{code, hostId, targetPoints}`
/// - 400 Bad Request: target outside 1..=100
async fn create_room(
    State(state): State<RoomsState>,
    body: Option<Json<CreateRoomRequest>>,
) -> ApiResult<impl IntoResponse> {
    let request = body.map(|Json(b)| b).unwrap_or_default();
    let target = request.target_points.unwrap_or(state.default_target_points);
    let created = state
        .coordinator
        .registry()
        .create_room(request.host_id, target)?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// Query-string variant of room creation
async fn create_room_query(
    State(state): State<RoomsState>,
    Query(query): Query<CreateRoomQuery>,
) -> ApiResult<impl IntoResponse> {
    let target = match query.target_points.as_deref().map(str::trim) {
        None | Some("") => state.default_target_points,
        Some(raw) => raw.parse::<u32>().map_err(|_| {
            ApiError::ValidationError(format!("targetPoints must be a number, got '{}'", raw))
        })?,
    };
    let created = state
        .coordinator
        .registry()
        .create_room(query.host_id, target)?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// Room snapshot
///
/// # Response
/// - 200 OK: room view with the current song hidden
/// - 404 Not Found: unknown code
async fn get_room(
    State(state): State<RoomsState>,
    Path(code): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let view = state.coordinator.snapshot(&code).await?;
    Ok(Json(view))
}
