//! Spotify API response models

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// A playlist track as seen by the catalog
///
/// Every field the Web API may omit (local files, unavailable tracks,
/// podcast episodes) stays optional; callers decide what is usable.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SpotifyTrack {
    /// Spotify track ID
    pub id: Option<String>,
    /// Playback URI (`spotify:track:...`)
    pub uri: Option<String>,
    /// Track title
    pub name: Option<String>,
    /// Artist names in credit order
    pub artists: Vec<String>,
    /// Album title
    pub album: Option<String>,
    /// Largest album cover URL
    pub cover_url: Option<String>,
    /// Album release date as reported (`1999`, `1999-05` or `1999-05-12`)
    pub release_date: Option<String>,
    /// Precision of `release_date` (`year`, `month` or `day`)
    pub release_date_precision: Option<String>,
}

/// What the provider reports as currently playing
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NowPlaying {
    /// URI of the current item, if any
    pub uri: Option<String>,
    /// Whether playback is running
    pub is_playing: bool,
}

/// OAuth token pair for one user account
#[derive(Clone, Serialize, Deserialize)]
pub struct TokenSet {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
}

impl std::fmt::Debug for TokenSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSet")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "[REDACTED]"))
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

impl TokenSet {
    /// Build a token set expiring `expires_in_secs` from now
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: Option<String>,
        expires_in_secs: i64,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token,
            expires_at: Utc::now() + Duration::seconds(expires_in_secs),
        }
    }

    /// Whether the access token expires within `margin_secs`
    pub fn expires_within(&self, margin_secs: i64) -> bool {
        self.expires_at <= Utc::now() + Duration::seconds(margin_secs)
    }
}

// Internal response types for deserialization

#[derive(Debug, Deserialize)]
pub(crate) struct PlaylistTracksPage {
    #[serde(default)]
    pub items: Vec<PlaylistItem>,
    pub next: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PlaylistItem {
    pub track: Option<RawTrack>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawTrack {
    pub id: Option<String>,
    pub uri: Option<String>,
    pub name: Option<String>,
    #[serde(default)]
    pub artists: Vec<RawArtist>,
    pub album: Option<RawAlbum>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawArtist {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawAlbum {
    pub name: Option<String>,
    pub release_date: Option<String>,
    pub release_date_precision: Option<String>,
    #[serde(default)]
    pub images: Vec<RawImage>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawImage {
    pub url: String,
    pub width: Option<u32>,
}

impl From<RawTrack> for SpotifyTrack {
    fn from(raw: RawTrack) -> Self {
        let (album, release_date, release_date_precision, cover_url) = match raw.album {
            Some(album) => {
                let cover_url = album
                    .images
                    .iter()
                    .max_by_key(|image| image.width.unwrap_or(0))
                    .map(|image| image.url.clone());
                (
                    album.name,
                    album.release_date,
                    album.release_date_precision,
                    cover_url,
                )
            }
            None => (None, None, None, None),
        };

        Self {
            id: raw.id.filter(|s| !s.is_empty()),
            uri: raw.uri.filter(|s| !s.is_empty()),
            name: raw.name.filter(|s| !s.is_empty()),
            artists: raw.artists.into_iter().map(|a| a.name).collect(),
            album,
            cover_url,
            release_date,
            release_date_precision,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawCurrentlyPlaying {
    #[serde(default)]
    pub is_playing: bool,
    pub item: Option<RawPlayingItem>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawPlayingItem {
    pub uri: Option<String>,
}

impl From<RawCurrentlyPlaying> for NowPlaying {
    fn from(raw: RawCurrentlyPlaying) -> Self {
        Self {
            uri: raw.item.and_then(|item| item.uri),
            is_playing: raw.is_playing,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawTokenResponse {
    pub access_token: String,
    pub expires_in: i64,
    pub refresh_token: Option<String>,
}

/// Spotify API error response
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    #[allow(dead_code)] // Mirrors the HTTP status, kept for deserialization
    pub status: Option<u16>,
    pub message: String,
}
