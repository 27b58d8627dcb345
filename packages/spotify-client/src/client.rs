//! Spotify Web API client implementation

use std::fmt;
use std::future::Future;
use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde_json::json;
use tracing::{debug, instrument, warn};

use crate::error::{SpotifyError, SpotifyResult};
use crate::models::{
    ErrorResponse, NowPlaying, PlaylistTracksPage, RawCurrentlyPlaying, RawTokenResponse,
    SpotifyTrack, TokenSet,
};

/// Spotify Web API base URL
const SPOTIFY_API_URL: &str = "https://api.spotify.com";

/// Spotify accounts service base URL
const SPOTIFY_ACCOUNTS_URL: &str = "https://accounts.spotify.com";

/// Default request timeout in seconds
const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Default connection timeout in seconds
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 5;

/// Page size for playlist track listing (API maximum)
const PLAYLIST_PAGE_SIZE: u32 = 100;

/// Upper bound on playlist pages fetched for one deck
const MAX_PLAYLIST_PAGES: u32 = 20;

/// Fields requested for playlist items
const PLAYLIST_FIELDS: &str = "items(track(id,uri,name,artists(name),album(name,release_date,release_date_precision,images))),next";

/// Maximum playlist ID length
const MAX_PLAYLIST_ID_LENGTH: usize = 64;

/// Default number of retry attempts for transient failures
const DEFAULT_MAX_RETRIES: u32 = 3;

/// Base delay for exponential backoff (milliseconds)
const RETRY_BASE_DELAY_MS: u64 = 100;

/// Spotify Web API client
///
/// Stateless with respect to users: every user-scoped call takes the
/// access token explicitly, so one client serves every host.
#[derive(Clone)]
pub struct SpotifyClient {
    http_client: Client,
    client_id: String,
    client_secret: String,
    api_url: String,
    accounts_url: String,
    max_retries: u32,
}

impl fmt::Debug for SpotifyClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpotifyClient")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("api_url", &self.api_url)
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

impl SpotifyClient {
    /// Create a new Spotify client with the given application credentials
    ///
    /// # Errors
    /// Returns `SpotifyError::MissingCredentials` if either credential is empty
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> SpotifyResult<Self> {
        Self::with_timeout(client_id, client_secret, DEFAULT_TIMEOUT_SECS)
    }

    /// Create a client with a custom request timeout
    pub fn with_timeout(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        timeout_secs: u64,
    ) -> SpotifyResult<Self> {
        let client_id = client_id.into();
        let client_secret = client_secret.into();
        if client_id.is_empty() || client_secret.is_empty() {
            return Err(SpotifyError::MissingCredentials);
        }

        let http_client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS))
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .user_agent("Songline/1.0")
            .build()?;

        Ok(Self {
            http_client,
            client_id,
            client_secret,
            api_url: SPOTIFY_API_URL.to_string(),
            accounts_url: SPOTIFY_ACCOUNTS_URL.to_string(),
            max_retries: DEFAULT_MAX_RETRIES,
        })
    }

    /// Create a Spotify client from environment variables
    ///
    /// Reads `SPOTIFY_CLIENT_ID` and `SPOTIFY_CLIENT_SECRET`.
    pub fn from_env() -> SpotifyResult<Self> {
        let read = |name: &str| match std::env::var(name) {
            Ok(value) if !value.is_empty() => Ok(value),
            Ok(_) | Err(std::env::VarError::NotPresent) => Err(SpotifyError::MissingCredentials),
            Err(std::env::VarError::NotUnicode(_)) => Err(SpotifyError::InvalidInput(format!(
                "{} contains invalid UTF-8",
                name
            ))),
        };
        Self::new(read("SPOTIFY_CLIENT_ID")?, read("SPOTIFY_CLIENT_SECRET")?)
    }

    /// Point the client at different API and accounts hosts
    pub fn with_base_urls(
        mut self,
        api_url: impl Into<String>,
        accounts_url: impl Into<String>,
    ) -> Self {
        self.api_url = api_url.into().trim_end_matches('/').to_string();
        self.accounts_url = accounts_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Override the retry budget for transient failures
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Normalize a playlist reference into a bare playlist ID
    ///
    /// Accepts a bare ID, a `spotify:playlist:` URI or an
    /// `open.spotify.com/playlist/` link.
    pub fn normalize_playlist_id(reference: &str) -> SpotifyResult<String> {
        let trimmed = reference.trim();
        let id = if let Some(rest) = trimmed.strip_prefix("spotify:playlist:") {
            rest
        } else if let Some(pos) = trimmed.find("/playlist/") {
            let rest = &trimmed[pos + "/playlist/".len()..];
            rest.split(['?', '/']).next().unwrap_or_default()
        } else {
            trimmed
        };

        if id.is_empty() {
            return Err(SpotifyError::InvalidInput(
                "playlist id cannot be empty".to_string(),
            ));
        }
        if id.len() > MAX_PLAYLIST_ID_LENGTH {
            return Err(SpotifyError::InvalidInput(format!(
                "playlist id too long (max {} characters)",
                MAX_PLAYLIST_ID_LENGTH
            )));
        }
        if !id.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(SpotifyError::InvalidInput(
                "playlist id contains invalid characters".to_string(),
            ));
        }
        Ok(id.to_string())
    }

    fn validate_track_uri(uri: &str) -> SpotifyResult<()> {
        if uri.starts_with("spotify:") && uri.len() > "spotify:".len() {
            Ok(())
        } else {
            Err(SpotifyError::InvalidInput(format!(
                "not a Spotify URI: {}",
                uri
            )))
        }
    }

    /// Execute an operation with retry logic for transient failures
    async fn with_retry<T, F, Fut>(&self, operation: F) -> SpotifyResult<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = SpotifyResult<T>>,
    {
        let mut attempt = 0;
        loop {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    attempt += 1;
                    let delay_ms = match &e {
                        SpotifyError::RateLimited { retry_after } => retry_after * 1000,
                        _ => RETRY_BASE_DELAY_MS * 2u64.pow(attempt),
                    };
                    warn!(
                        attempt = attempt,
                        max_retries = self.max_retries,
                        delay_ms = delay_ms,
                        error = %e,
                        "Spotify request failed, retrying"
                    );
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Send a request and turn non-success statuses into typed errors
    async fn send(&self, request: RequestBuilder) -> SpotifyResult<Response> {
        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                SpotifyError::Timeout
            } else {
                SpotifyError::Http(e)
            }
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok())
                .unwrap_or(1);
            warn!(retry_after, "Spotify API rate limited");
            return Err(SpotifyError::RateLimited { retry_after });
        }

        let text = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorResponse>(&text)
            .map(|e| e.error.message)
            .unwrap_or(text);

        Err(match status {
            StatusCode::UNAUTHORIZED => SpotifyError::Unauthorized,
            StatusCode::NOT_FOUND => SpotifyError::NotFound(message),
            _ => SpotifyError::Api {
                status: status.as_u16(),
                message,
            },
        })
    }

    fn player_url(&self, path: &str) -> String {
        format!("{}/v1/me/player{}", self.api_url, path)
    }

    /// Exchange a refresh token for a fresh access token
    ///
    /// Spotify may omit a new refresh token; the old one is carried over.
    #[instrument(skip(self, refresh_token))]
    pub async fn refresh_token(&self, refresh_token: &str) -> SpotifyResult<TokenSet> {
        let url = format!("{}/api/token", self.accounts_url);
        let request = self
            .http_client
            .post(&url)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
            ]);

        let response = match self.send(request).await {
            Ok(response) => response,
            Err(SpotifyError::Api { message, .. }) => return Err(SpotifyError::TokenRefresh(message)),
            Err(SpotifyError::Unauthorized) => {
                return Err(SpotifyError::TokenRefresh("client credentials rejected".into()))
            }
            Err(e) => return Err(e),
        };

        let raw: RawTokenResponse = serde_json::from_str(&response.text().await?)?;
        debug!(expires_in = raw.expires_in, "Refreshed Spotify access token");

        Ok(TokenSet::new(
            raw.access_token,
            raw.refresh_token.or_else(|| Some(refresh_token.to_string())),
            raw.expires_in,
        ))
    }

    /// Fetch every track of a playlist, following pagination
    ///
    /// # Errors
    /// - `SpotifyError::InvalidInput` - If the playlist reference is malformed
    /// - `SpotifyError::NotFound` - If the playlist does not exist or is private
    /// - `SpotifyError::Unauthorized` - If the access token was rejected
    #[instrument(skip(self, access_token))]
    pub async fn playlist_tracks(
        &self,
        access_token: &str,
        playlist: &str,
        market: Option<&str>,
    ) -> SpotifyResult<Vec<SpotifyTrack>> {
        let playlist_id = Self::normalize_playlist_id(playlist)?;
        let url = format!("{}/v1/playlists/{}/tracks", self.api_url, playlist_id);
        let limit = PLAYLIST_PAGE_SIZE.to_string();

        let mut tracks = Vec::new();
        for page in 0..MAX_PLAYLIST_PAGES {
            let offset = (page * PLAYLIST_PAGE_SIZE).to_string();
            let text = self
                .with_retry(|| async {
                    let mut query = vec![
                        ("limit", limit.as_str()),
                        ("offset", offset.as_str()),
                        ("fields", PLAYLIST_FIELDS),
                    ];
                    if let Some(market) = market {
                        query.push(("market", market));
                    }
                    let request = self
                        .http_client
                        .get(&url)
                        .bearer_auth(access_token)
                        .query(&query);
                    self.send(request).await?.text().await.map_err(SpotifyError::Http)
                })
                .await?;

            let page: PlaylistTracksPage = serde_json::from_str(&text)?;
            tracks.extend(
                page.items
                    .into_iter()
                    .filter_map(|item| item.track)
                    .map(SpotifyTrack::from),
            );

            if page.next.is_none() {
                break;
            }
        }

        debug!(
            playlist = %playlist_id,
            track_count = tracks.len(),
            "Fetched playlist tracks"
        );

        Ok(tracks)
    }

    /// Report what the account is currently playing
    ///
    /// A `204 No Content` (nothing playing) maps to an empty `NowPlaying`.
    #[instrument(skip(self, access_token))]
    pub async fn currently_playing(&self, access_token: &str) -> SpotifyResult<NowPlaying> {
        let url = self.player_url("/currently-playing");
        self.with_retry(|| async {
            let response = self
                .send(self.http_client.get(&url).bearer_auth(access_token))
                .await?;
            if response.status() == StatusCode::NO_CONTENT {
                return Ok(NowPlaying::default());
            }
            let text = response.text().await?;
            if text.trim().is_empty() {
                return Ok(NowPlaying::default());
            }
            let raw: RawCurrentlyPlaying = serde_json::from_str(&text)?;
            Ok(NowPlaying::from(raw))
        })
        .await
    }

    /// Make `device_id` the active playback device
    #[instrument(skip(self, access_token))]
    pub async fn transfer_playback(
        &self,
        access_token: &str,
        device_id: &str,
        play: bool,
    ) -> SpotifyResult<()> {
        let url = self.player_url("");
        let body = json!({ "device_ids": [device_id], "play": play });
        self.with_retry(|| async {
            self.send(self.http_client.put(&url).bearer_auth(access_token).json(&body))
                .await
                .map(|_| ())
        })
        .await
    }

    /// Start playing a single track on a device
    #[instrument(skip(self, access_token))]
    pub async fn play_uri(&self, access_token: &str, device_id: &str, uri: &str) -> SpotifyResult<()> {
        Self::validate_track_uri(uri)?;
        let url = self.player_url("/play");
        let body = json!({ "uris": [uri] });
        self.with_retry(|| async {
            let request = self
                .http_client
                .put(&url)
                .bearer_auth(access_token)
                .query(&[("device_id", device_id)])
                .json(&body);
            self.send(request).await.map(|_| ())
        })
        .await
    }

    /// Resume whatever the device had loaded
    #[instrument(skip(self, access_token))]
    pub async fn resume(&self, access_token: &str, device_id: &str) -> SpotifyResult<()> {
        let url = self.player_url("/play");
        self.with_retry(|| async {
            let request = self
                .http_client
                .put(&url)
                .bearer_auth(access_token)
                .query(&[("device_id", device_id)])
                .json(&json!({}));
            self.send(request).await.map(|_| ())
        })
        .await
    }

    /// Pause playback, optionally on a specific device
    #[instrument(skip(self, access_token))]
    pub async fn pause(&self, access_token: &str, device_id: Option<&str>) -> SpotifyResult<()> {
        let url = self.player_url("/pause");
        self.with_retry(|| async {
            let mut request = self
                .http_client
                .put(&url)
                .bearer_auth(access_token)
                .header(reqwest::header::CONTENT_LENGTH, "0");
            if let Some(device_id) = device_id {
                request = request.query(&[("device_id", device_id)]);
            }
            self.send(request).await.map(|_| ())
        })
        .await
    }

    /// Append a track to the device queue
    ///
    /// Not retried: a replayed POST would queue the track twice.
    #[instrument(skip(self, access_token))]
    pub async fn enqueue(&self, access_token: &str, device_id: &str, uri: &str) -> SpotifyResult<()> {
        Self::validate_track_uri(uri)?;
        let request = self
            .http_client
            .post(self.player_url("/queue"))
            .bearer_auth(access_token)
            .query(&[("uri", uri), ("device_id", device_id)])
            .header(reqwest::header::CONTENT_LENGTH, "0");
        self.send(request).await.map(|_| ())
    }

    /// Skip to the next item in the device queue
    ///
    /// Not retried for the same reason as [`SpotifyClient::enqueue`].
    #[instrument(skip(self, access_token))]
    pub async fn skip_next(&self, access_token: &str, device_id: &str) -> SpotifyResult<()> {
        let request = self
            .http_client
            .post(self.player_url("/next"))
            .bearer_auth(access_token)
            .query(&[("device_id", device_id)])
            .header(reqwest::header::CONTENT_LENGTH, "0");
        self.send(request).await.map(|_| ())
    }

    /// Set the device volume (0-100)
    #[instrument(skip(self, access_token))]
    pub async fn set_volume(
        &self,
        access_token: &str,
        device_id: &str,
        volume_percent: u8,
    ) -> SpotifyResult<()> {
        let url = self.player_url("/volume");
        let volume = volume_percent.min(100).to_string();
        self.with_retry(|| async {
            let request = self
                .http_client
                .put(&url)
                .bearer_auth(access_token)
                .query(&[("volume_percent", volume.as_str()), ("device_id", device_id)])
                .header(reqwest::header::CONTENT_LENGTH, "0");
            self.send(request).await.map(|_| ())
        })
        .await
    }
}
