//! Host credential REST route handlers
//!
//! - `PUT /api/hosts/:hostId/token` - Hand over the host's music account token

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::put,
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::error::{ApiError, ApiResult};
use crate::services::spotify::TokenSet;
use crate::services::SpotifyService;

/// Shared state for host handlers
#[derive(Clone)]
pub struct HostsState {
    /// Absent when no Spotify application is configured
    pub spotify: Option<Arc<SpotifyService>>,
}

impl HostsState {
    pub fn new(spotify: Option<Arc<SpotifyService>>) -> Self {
        Self { spotify }
    }
}

/// Create host router
pub fn hosts_router(state: HostsState) -> Router {
    Router::new()
        .route("/:host_id/token", put(store_token))
        .with_state(state)
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenRequest {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub expires_in: i64,
}

impl std::fmt::Debug for TokenRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenRequest")
            .field("access_token", &"[REDACTED]")
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

/// Store a host token
///
/// # Response
/// - 204 No Content
/// - 400 Bad Request: empty token or malformed body
/// - 500 Internal Server Error: Spotify is not configured
async fn store_token(
    State(state): State<HostsState>,
    Path(host_id): Path<String>,
    payload: Result<Json<TokenRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(request) = payload.map_err(ApiError::from)?;
    let spotify = state
        .spotify
        .as_ref()
        .ok_or_else(|| ApiError::Configuration("Spotify is not configured".to_string()))?;

    if request.access_token.trim().is_empty() {
        return Err(ApiError::ValidationError("accessToken is required".to_string()));
    }

    spotify.store_token(
        &host_id,
        TokenSet::new(request.access_token, request.refresh_token, request.expires_in),
    );
    Ok(StatusCode::NO_CONTENT)
}
