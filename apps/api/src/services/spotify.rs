//! Spotify adapter
//!
//! Implements [`PlaybackProvider`] and [`CatalogSource`] on top of the
//! Spotify client crate. Hosts hand in their OAuth tokens through the API;
//! an expired or rejected access token is refreshed once and the call is
//! replayed.

use std::future::Future;

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::{debug, info, instrument, warn};

use crate::error::{ApiError, ApiResult};
use crate::models::CatalogTrack;
use crate::services::deck::CatalogSource;
use crate::services::playback::{PlaybackProvider, PlaybackState};

pub use songline_spotify_client::{SpotifyClient, SpotifyError, SpotifyTrack, TokenSet};
use songline_shared_config::SpotifyConfig;

/// Tokens expiring this close are refreshed before use
const TOKEN_REFRESH_MARGIN_SECS: i64 = 60;

/// Map Spotify errors to API errors with explicit handling of all variants
pub fn map_spotify_error(e: SpotifyError) -> ApiError {
    match e {
        SpotifyError::MissingCredentials => {
            ApiError::Configuration("Spotify credentials not configured".into())
        }
        SpotifyError::InvalidInput(msg) => ApiError::ValidationError(msg),
        SpotifyError::NotFound(what) => ApiError::not_found("spotify resource", what),
        SpotifyError::Unauthorized => ApiError::InvalidToken("access token rejected".into()),
        SpotifyError::TokenRefresh(msg) => ApiError::InvalidToken(msg),
        SpotifyError::RateLimited { retry_after } => {
            ApiError::Playback(format!("rate limited, retry after {}s", retry_after))
        }
        SpotifyError::Timeout => ApiError::Timeout("spotify request"),
        SpotifyError::Http(err) => ApiError::Playback(format!("HTTP error: {}", err)),
        SpotifyError::Parse(err) => ApiError::Playback(format!("parse error: {}", err)),
        SpotifyError::Api { status, message } => {
            ApiError::Playback(format!("API error {}: {}", status, message))
        }
    }
}

impl From<SpotifyTrack> for CatalogTrack {
    fn from(track: SpotifyTrack) -> Self {
        Self {
            id: track.id,
            uri: track.uri,
            name: track.name,
            artists: track.artists,
            album: track.album,
            cover_url: track.cover_url,
            release_date: track.release_date,
            release_date_precision: track.release_date_precision,
        }
    }
}

/// Spotify-backed catalog and playback for every host
pub struct SpotifyService {
    client: SpotifyClient,
    market: Option<String>,
    tokens: DashMap<String, TokenSet>,
}

impl std::fmt::Debug for SpotifyService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpotifyService")
            .field("client", &self.client)
            .field("market", &self.market)
            .field("hosts", &self.tokens.len())
            .finish()
    }
}

impl SpotifyService {
    pub fn new(client: SpotifyClient, market: Option<String>) -> Self {
        Self {
            client,
            market,
            tokens: DashMap::new(),
        }
    }

    /// Build from shared configuration
    ///
    /// # Errors
    /// Returns `ApiError::Configuration` if the credentials are unusable
    pub fn from_config(config: &SpotifyConfig) -> ApiResult<Self> {
        let client = SpotifyClient::with_timeout(
            &config.client_id,
            &config.client_secret,
            config.timeout_secs,
        )
        .map_err(|e| match e {
            SpotifyError::MissingCredentials => ApiError::Configuration(
                "SPOTIFY_CLIENT_ID and SPOTIFY_CLIENT_SECRET are required".into(),
            ),
            other => map_spotify_error(other),
        })?
        .with_base_urls(&config.api_url, &config.accounts_url);

        Ok(Self::new(client, config.market.clone()))
    }

    /// Store or replace the tokens of a host
    pub fn store_token(&self, host_id: &str, token: TokenSet) {
        info!(host_id, expires_at = %token.expires_at, "Host token stored");
        self.tokens.insert(host_id.to_string(), token);
    }

    pub fn has_token(&self, host_id: &str) -> bool {
        self.tokens.contains_key(host_id)
    }

    /// Drop tokens of hosts for which `keep` is false
    pub fn evict_unused(&self, keep: impl Fn(&str) -> bool) -> usize {
        let before = self.tokens.len();
        self.tokens.retain(|host_id, _| keep(host_id));
        let evicted = before.saturating_sub(self.tokens.len());
        if evicted > 0 {
            debug!(evicted, "Dropped tokens of departed hosts");
        }
        evicted
    }

    /// Current access token, refreshed first when about to expire
    async fn access_token(&self, host_id: &str) -> ApiResult<String> {
        let (access, expiring) = {
            let token = self.tokens.get(host_id).ok_or_else(|| {
                ApiError::InvalidToken(format!("no Spotify token for host {}", host_id))
            })?;
            (
                token.access_token.clone(),
                token.expires_within(TOKEN_REFRESH_MARGIN_SECS) && token.refresh_token.is_some(),
            )
        };

        if expiring {
            debug!(host_id, "Access token about to expire, refreshing");
            return self.refresh(host_id).await;
        }
        Ok(access)
    }

    /// Exchange the stored refresh token for a new access token
    #[instrument(skip(self))]
    async fn refresh(&self, host_id: &str) -> ApiResult<String> {
        let refresh_token = self
            .tokens
            .get(host_id)
            .and_then(|t| t.refresh_token.clone())
            .ok_or_else(|| ApiError::InvalidToken("no refresh token available".into()))?;

        let fresh = self.client.refresh_token(&refresh_token).await.map_err(|e| {
            warn!(host_id, error = %e, "Token refresh failed");
            match e {
                SpotifyError::TokenRefresh(msg) => ApiError::InvalidToken(msg),
                other => ApiError::InvalidToken(other.to_string()),
            }
        })?;

        let access = fresh.access_token.clone();
        self.tokens.insert(host_id.to_string(), fresh);
        Ok(access)
    }

    /// Run a call with the host's token, refreshing and replaying once on 401
    async fn with_token<T, F, Fut>(&self, host_id: &str, call: F) -> ApiResult<T>
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = Result<T, SpotifyError>>,
    {
        let token = self.access_token(host_id).await?;
        match call(token).await {
            Err(e) if e.is_unauthorized() => {
                debug!(host_id, "Access token rejected, refreshing once");
                let token = self.refresh(host_id).await?;
                call(token).await.map_err(map_spotify_error)
            }
            other => other.map_err(map_spotify_error),
        }
    }
}

#[async_trait]
impl CatalogSource for SpotifyService {
    fn source_id(&self) -> &'static str {
        "spotify"
    }

    async fn fetch_tracks(
        &self,
        host_id: &str,
        playlist_id: Option<&str>,
    ) -> ApiResult<Vec<CatalogTrack>> {
        let playlist = playlist_id.ok_or_else(|| {
            ApiError::ValidationError("a playlist is required to build the deck".into())
        })?;
        let market = self.market.as_deref();

        let tracks = self
            .with_token(host_id, |token| async move {
                self.client.playlist_tracks(&token, playlist, market).await
            })
            .await
            .map_err(|e| match e {
                ApiError::Playback(msg) => ApiError::Catalog(msg),
                other => other,
            })?;

        Ok(tracks.into_iter().map(CatalogTrack::from).collect())
    }
}

#[async_trait]
impl PlaybackProvider for SpotifyService {
    async fn transfer(&self, host_id: &str, device_id: &str, play: bool) -> ApiResult<()> {
        self.with_token(host_id, |token| async move {
            self.client.transfer_playback(&token, device_id, play).await
        })
        .await
    }

    async fn play_uri(&self, host_id: &str, device_id: &str, uri: &str) -> ApiResult<()> {
        self.with_token(host_id, |token| async move {
            self.client.play_uri(&token, device_id, uri).await
        })
        .await
    }

    async fn resume(&self, host_id: &str, device_id: &str) -> ApiResult<()> {
        self.with_token(host_id, |token| async move {
            self.client.resume(&token, device_id).await
        })
        .await
    }

    async fn pause(&self, host_id: &str, device_id: Option<&str>) -> ApiResult<()> {
        self.with_token(host_id, |token| async move {
            self.client.pause(&token, device_id).await
        })
        .await
    }

    async fn enqueue_and_skip(&self, host_id: &str, device_id: &str, uri: &str) -> ApiResult<()> {
        self.with_token(host_id, |token| async move {
            self.client.enqueue(&token, device_id, uri).await
        })
        .await?;
        self.with_token(host_id, |token| async move {
            self.client.skip_next(&token, device_id).await
        })
        .await
    }

    async fn currently_playing(&self, host_id: &str) -> ApiResult<PlaybackState> {
        let now = self
            .with_token(host_id, |token| async move {
                self.client.currently_playing(&token).await
            })
            .await?;
        Ok(PlaybackState {
            uri: now.uri,
            is_playing: now.is_playing,
        })
    }

    async fn set_volume(&self, host_id: &str, device_id: &str, percent: u8) -> ApiResult<()> {
        self.with_token(host_id, |token| async move {
            self.client.set_volume(&token, device_id, percent).await
        })
        .await
    }
}
