//! Deck building from an external catalog
//!
//! A [`CatalogSource`] supplies raw track entries for a playlist; the
//! [`DeckEngine`] validates, filters, de-duplicates and shuffles them into
//! the card pool of a game.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use rand::seq::SliceRandom;
use serde::Deserialize;
use tracing::{info, instrument, warn};

use crate::error::{ApiError, ApiResult};
use crate::models::{CatalogTrack, Card, GameConfig};

/// Source of raw catalog entries
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// Source identifier for logs
    fn source_id(&self) -> &'static str;

    /// Fetch the entries of a playlist on behalf of a host
    ///
    /// `playlist_id` is `None` when neither the start request nor the
    /// server configuration names one.
    async fn fetch_tracks(
        &self,
        host_id: &str,
        playlist_id: Option<&str>,
    ) -> ApiResult<Vec<CatalogTrack>>;
}

/// Builds decks for rooms
#[derive(Clone)]
pub struct DeckEngine {
    source: Arc<dyn CatalogSource>,
    min_deck_size: usize,
    default_playlist_id: Option<String>,
}

impl std::fmt::Debug for DeckEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeckEngine")
            .field("source", &self.source.source_id())
            .field("min_deck_size", &self.min_deck_size)
            .field("default_playlist_id", &self.default_playlist_id)
            .finish()
    }
}

impl DeckEngine {
    pub fn new(
        source: Arc<dyn CatalogSource>,
        min_deck_size: usize,
        default_playlist_id: Option<String>,
    ) -> Self {
        Self {
            source,
            min_deck_size,
            default_playlist_id,
        }
    }

    /// Fetch and build a shuffled deck for a new game
    ///
    /// # Errors
    /// - Catalog errors from the source
    /// - `ApiError::DeckTooSmall` if fewer than the minimum playable cards remain
    #[instrument(skip(self, config), fields(source = self.source.source_id()))]
    pub async fn load_deck(&self, host_id: &str, config: &GameConfig) -> ApiResult<Vec<Card>> {
        let playlist_id = config
            .playlist_id
            .as_deref()
            .or(self.default_playlist_id.as_deref());

        let entries = self.source.fetch_tracks(host_id, playlist_id).await?;
        let fetched = entries.len();
        let cards = build_deck(entries, config, self.min_deck_size)?;

        info!(
            playlist_id = playlist_id.unwrap_or("<default>"),
            fetched,
            playable = cards.len(),
            "Deck loaded"
        );
        Ok(cards)
    }
}

/// Validate, filter, de-duplicate and shuffle catalog entries
pub fn build_deck(
    entries: Vec<CatalogTrack>,
    config: &GameConfig,
    min_deck_size: usize,
) -> ApiResult<Vec<Card>> {
    let mut seen = HashSet::new();
    let mut cards: Vec<Card> = entries
        .into_iter()
        .filter_map(CatalogTrack::into_card)
        .filter(|card| config.min_year.map_or(true, |min| card.year() >= min))
        .filter(|card| config.max_year.map_or(true, |max| card.year() <= max))
        .filter(|card| seen.insert(card.track_id.clone()))
        .collect();

    if cards.len() < min_deck_size {
        return Err(ApiError::DeckTooSmall {
            available: cards.len(),
            required: min_deck_size,
        });
    }

    cards.shuffle(&mut rand::thread_rng());
    Ok(cards)
}

/// Catalog backed by a local JSON file
///
/// The file holds either a flat array of entries or an object mapping
/// playlist ids to arrays.
#[derive(Debug, Clone)]
pub struct JsonFileCatalog {
    path: PathBuf,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum DeckFile {
    Flat(Vec<CatalogTrack>),
    Playlists(HashMap<String, Vec<CatalogTrack>>),
}

impl JsonFileCatalog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl CatalogSource for JsonFileCatalog {
    fn source_id(&self) -> &'static str {
        "deck-file"
    }

    async fn fetch_tracks(
        &self,
        _host_id: &str,
        playlist_id: Option<&str>,
    ) -> ApiResult<Vec<CatalogTrack>> {
        let raw = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            ApiError::Catalog(format!("failed to read {}: {}", self.path.display(), e))
        })?;
        let file: DeckFile = serde_json::from_str(&raw)
            .map_err(|e| ApiError::Catalog(format!("invalid deck file: {}", e)))?;

        match (file, playlist_id) {
            (DeckFile::Flat(tracks), _) => Ok(tracks),
            (DeckFile::Playlists(mut lists), Some(id)) => lists
                .remove(id)
                .ok_or_else(|| ApiError::not_found("playlist", id)),
            (DeckFile::Playlists(lists), None) => {
                Ok(lists.into_values().flatten().collect())
            }
        }
    }
}

/// Catalog used when no card source is configured
#[derive(Debug, Clone, Copy, Default)]
pub struct UnconfiguredCatalog;

#[async_trait]
impl CatalogSource for UnconfiguredCatalog {
    fn source_id(&self) -> &'static str {
        "unconfigured"
    }

    async fn fetch_tracks(
        &self,
        _host_id: &str,
        _playlist_id: Option<&str>,
    ) -> ApiResult<Vec<CatalogTrack>> {
        warn!("Game start requested without a configured card source");
        Err(ApiError::Configuration(
            "no card source configured; set Spotify credentials or DECK_FILE".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::io::Write;

    fn entry(id: &str, year: i32) -> CatalogTrack {
        CatalogTrack {
            id: Some(id.to_string()),
            uri: Some(format!("spotify:track:{}", id)),
            name: Some(format!("Song {}", id)),
            artists: vec!["Artist".to_string()],
            album: None,
            cover_url: None,
            release_date: Some(year.to_string()),
            release_date_precision: Some("year".to_string()),
        }
    }

    fn entries(n: usize) -> Vec<CatalogTrack> {
        (0..n).map(|i| entry(&format!("t{}", i), 1950 + i as i32)).collect()
    }

    #[test]
    fn test_build_deck_drops_invalid_and_duplicates() {
        let mut raw = entries(5);
        raw.push(entry("t0", 1999));
        raw.push(CatalogTrack {
            release_date: None,
            ..entry("no-date", 1990)
        });

        let cards = build_deck(raw, &GameConfig::default(), 5).unwrap();
        assert_eq!(cards.len(), 5);
        let ids: HashSet<_> = cards.iter().map(|c| c.track_id.as_str()).collect();
        assert!(!ids.contains("no-date"));
    }

    #[test]
    fn test_build_deck_too_small() {
        let result = build_deck(entries(29), &GameConfig::default(), 30);
        assert_matches!(
            result,
            Err(ApiError::DeckTooSmall {
                available: 29,
                required: 30
            })
        );
    }

    #[test]
    fn test_build_deck_year_filter() {
        let config = GameConfig {
            min_year: Some(1960),
            max_year: Some(1969),
            ..GameConfig::default()
        };
        let cards = build_deck(entries(40), &config, 1).unwrap();
        assert_eq!(cards.len(), 10);
        assert!(cards.iter().all(|c| (1960..=1969).contains(&c.year())));
    }

    #[tokio::test]
    async fn test_deck_engine_uses_default_playlist() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let body = serde_json::json!({ "classics": entries(3), "other": entries(1) });
        write!(file, "{}", body).unwrap();

        let engine = DeckEngine::new(
            Arc::new(JsonFileCatalog::new(file.path())),
            3,
            Some("classics".to_string()),
        );
        let cards = engine.load_deck("host-1", &GameConfig::default()).await.unwrap();
        assert_eq!(cards.len(), 3);
    }

    #[tokio::test]
    async fn test_json_catalog_flat_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{}", serde_json::to_string(&entries(4)).unwrap()).unwrap();

        let catalog = JsonFileCatalog::new(file.path());
        let tracks = catalog.fetch_tracks("host-1", Some("ignored")).await.unwrap();
        assert_eq!(tracks.len(), 4);
    }

    #[tokio::test]
    async fn test_json_catalog_unknown_playlist() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{}", serde_json::json!({ "classics": entries(2) })).unwrap();

        let catalog = JsonFileCatalog::new(file.path());
        let result = catalog.fetch_tracks("host-1", Some("missing")).await;
        assert_matches!(result, Err(ApiError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_unconfigured_catalog_errors() {
        let result = UnconfiguredCatalog.fetch_tracks("host-1", None).await;
        assert_matches!(result, Err(ApiError::Configuration(_)));
    }
}
