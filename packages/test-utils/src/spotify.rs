//! Mock Spotify server for testing catalog and playback integrations
//!
//! Provides a [`MockSpotifyServer`] that simulates the Web API endpoints the
//! game server calls, plus the accounts token endpoint.

use serde_json::json;
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Mock Spotify server
///
/// Wraps a [`wiremock::MockServer`]; the same base URL serves both the Web
/// API (`/v1/...`) and the accounts service (`/api/token`).
pub struct MockSpotifyServer {
    server: MockServer,
    access_token: String,
}

impl MockSpotifyServer {
    /// Start a new mock server accepting the default access token
    pub async fn start() -> Self {
        Self::start_with_token("test-access-token").await
    }

    /// Start a new mock server accepting a custom access token
    pub async fn start_with_token(access_token: &str) -> Self {
        Self {
            server: MockServer::start().await,
            access_token: access_token.to_string(),
        }
    }

    /// Get the server URL
    pub fn url(&self) -> String {
        self.server.uri()
    }

    /// Get the access token the mocks accept
    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    fn bearer(&self) -> String {
        format!("Bearer {}", self.access_token)
    }

    /// Access the underlying wiremock server (for request assertions)
    pub fn inner(&self) -> &MockServer {
        &self.server
    }

    /// Mount a single-page playlist listing
    pub async fn mock_playlist_tracks(&self, playlist_id: &str, tracks: Vec<SpotifyTrackFixture>) {
        let items: Vec<serde_json::Value> = tracks
            .into_iter()
            .map(|t| json!({ "track": t.to_json() }))
            .collect();

        Mock::given(method("GET"))
            .and(path(format!("/v1/playlists/{}/tracks", playlist_id)))
            .and(header("Authorization", self.bearer().as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": items,
                "next": null
            })))
            .mount(&self.server)
            .await;
    }

    /// Mount a 404 for an unknown playlist
    pub async fn mock_playlist_not_found(&self, playlist_id: &str) {
        Mock::given(method("GET"))
            .and(path(format!("/v1/playlists/{}/tracks", playlist_id)))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "error": { "status": 404, "message": "Resource not found" }
            })))
            .mount(&self.server)
            .await;
    }

    /// Mount 401 responses for requests carrying `stale_token`
    pub async fn mock_expired_token(&self, stale_token: &str) {
        Mock::given(header("Authorization", format!("Bearer {}", stale_token).as_str()))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "error": { "status": 401, "message": "The access token expired" }
            })))
            .with_priority(1)
            .mount(&self.server)
            .await;
    }

    /// Mount a successful refresh that hands out this server's access token
    pub async fn mock_token_refresh(&self, refresh_token: &str) {
        Mock::given(method("POST"))
            .and(path("/api/token"))
            .and(body_string_contains("grant_type=refresh_token"))
            .and(body_string_contains(format!("refresh_token={}", refresh_token)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": self.access_token,
                "token_type": "Bearer",
                "expires_in": 3600,
                "scope": "user-modify-playback-state user-read-playback-state"
            })))
            .mount(&self.server)
            .await;
    }

    /// Mount a failing refresh (revoked refresh token)
    pub async fn mock_token_refresh_failure(&self) {
        Mock::given(method("POST"))
            .and(path("/api/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": "invalid_grant",
                "error_description": "Refresh token revoked"
            })))
            .mount(&self.server)
            .await;
    }

    /// Mount 204 responses for every player command
    pub async fn mock_player_commands_ok(&self) {
        for (verb, route) in [
            ("PUT", "/v1/me/player"),
            ("PUT", "/v1/me/player/play"),
            ("PUT", "/v1/me/player/pause"),
            ("PUT", "/v1/me/player/volume"),
            ("POST", "/v1/me/player/queue"),
            ("POST", "/v1/me/player/next"),
        ] {
            Mock::given(method(verb))
                .and(path(route))
                .and(header("Authorization", self.bearer().as_str()))
                .respond_with(ResponseTemplate::new(204))
                .mount(&self.server)
                .await;
        }
    }

    /// Mount a 404 "no active device" for player commands
    pub async fn mock_no_active_device(&self) {
        Mock::given(path("/v1/me/player/play"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "error": { "status": 404, "message": "Player command failed: No active device found", "reason": "NO_ACTIVE_DEVICE" }
            })))
            .mount(&self.server)
            .await;
    }

    /// Mount a currently-playing response
    pub async fn mock_currently_playing(&self, uri: &str, is_playing: bool) {
        Mock::given(method("GET"))
            .and(path("/v1/me/player/currently-playing"))
            .and(header("Authorization", self.bearer().as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "is_playing": is_playing,
                "progress_ms": 1200,
                "item": { "uri": uri, "type": "track" }
            })))
            .mount(&self.server)
            .await;
    }

    /// Mount a `204 No Content` currently-playing response (idle player)
    pub async fn mock_nothing_playing(&self) {
        Mock::given(method("GET"))
            .and(path("/v1/me/player/currently-playing"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&self.server)
            .await;
    }

    /// Mount a rate-limit response for every request to `route`
    pub async fn mock_rate_limited(&self, route: &str, retry_after_secs: u64) {
        Mock::given(path(route.to_string()))
            .respond_with(
                ResponseTemplate::new(429)
                    .insert_header("Retry-After", retry_after_secs.to_string().as_str()),
            )
            .mount(&self.server)
            .await;
    }

    /// Mount a server error for every request to `route`
    pub async fn mock_server_error(&self, route: &str) {
        Mock::given(path(route.to_string()))
            .respond_with(ResponseTemplate::new(503).set_body_json(json!({
                "error": { "status": 503, "message": "Service unavailable" }
            })))
            .mount(&self.server)
            .await;
    }

    /// Mount a volume failure (premium-only or unsupported device)
    pub async fn mock_volume_forbidden(&self) {
        Mock::given(method("PUT"))
            .and(path("/v1/me/player/volume"))
            .and(query_param("volume_percent", "50"))
            .respond_with(ResponseTemplate::new(403).set_body_json(json!({
                "error": { "status": 403, "message": "Cannot control device volume" }
            })))
            .with_priority(1)
            .mount(&self.server)
            .await;
    }
}

/// Fixture builder for playlist tracks
#[derive(Debug, Clone)]
pub struct SpotifyTrackFixture {
    pub id: Option<String>,
    pub name: Option<String>,
    pub artist: String,
    pub album: String,
    pub release_date: Option<String>,
    pub release_date_precision: String,
}

impl SpotifyTrackFixture {
    /// A complete track released on `release_date` (`YYYY`, `YYYY-MM` or `YYYY-MM-DD`)
    pub fn new(id: &str, release_date: &str) -> Self {
        let precision = match release_date.matches('-').count() {
            0 => "year",
            1 => "month",
            _ => "day",
        };
        Self {
            id: Some(id.to_string()),
            name: Some(format!("Song {}", id)),
            artist: format!("Artist {}", id),
            album: format!("Album {}", id),
            release_date: Some(release_date.to_string()),
            release_date_precision: precision.to_string(),
        }
    }

    /// A local file entry (no id, no URI) as Spotify returns them
    pub fn local_file(name: &str) -> Self {
        Self {
            id: None,
            name: Some(name.to_string()),
            artist: "Unknown".to_string(),
            album: "Local Files".to_string(),
            release_date: None,
            release_date_precision: "year".to_string(),
        }
    }

    /// Convert to Web API JSON
    pub fn to_json(&self) -> serde_json::Value {
        json!({
            "id": self.id,
            "uri": self.id.as_ref().map(|id| format!("spotify:track:{}", id)),
            "name": self.name,
            "artists": [{ "name": self.artist }],
            "album": {
                "name": self.album,
                "release_date": self.release_date,
                "release_date_precision": self.release_date_precision,
                "images": [
                    { "url": "https://i.scdn.co/image/small", "width": 64, "height": 64 },
                    { "url": "https://i.scdn.co/image/large", "width": 640, "height": 640 }
                ]
            }
        })
    }
}
