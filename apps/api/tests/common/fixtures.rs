//! Test fixtures for API integration tests
//!
//! In-memory card source and playback provider plus a context builder.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use songline_api::config::GameSettings;
use songline_api::models::CatalogTrack;
use songline_api::services::{
    CatalogSource, PlaybackProvider, PlaybackState, RetryPolicy,
};
use songline_api::{ApiError, ApiResult, AppContext};

/// Catalog track with a year-precision release date
pub fn track(id: &str, year: i32) -> CatalogTrack {
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

/// `count` tracks with distinct years starting at 1960
pub fn distinct_tracks(count: usize) -> Vec<CatalogTrack> {
    (0..count)
        .map(|i| track(&format!("t{:02}", i), 1960 + i as i32))
        .collect()
}

/// Card source serving a fixed list
#[derive(Default)]
pub struct FakeCatalog {
    tracks: Vec<CatalogTrack>,
    pub fetches: AtomicUsize,
    /// Simulated catalog latency
    delay: Option<Duration>,
}

impl FakeCatalog {
    pub fn new(tracks: Vec<CatalogTrack>) -> Self {
        Self {
            tracks,
            fetches: AtomicUsize::new(0),
            delay: None,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl CatalogSource for FakeCatalog {
    fn source_id(&self) -> &'static str {
        "fake"
    }

    async fn fetch_tracks(
        &self,
        _host_id: &str,
        _playlist_id: Option<&str>,
    ) -> ApiResult<Vec<CatalogTrack>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self.tracks.clone())
    }
}

/// Provider that records every command and plays whatever was skipped to
#[derive(Default)]
pub struct RecordingProvider {
    calls: Mutex<Vec<String>>,
    playing: Mutex<Option<String>>,
    /// Fail device transfer as if the device were gone
    pub fail_transfer: bool,
}

impl RecordingProvider {
    pub fn failing_transfer() -> Self {
        Self {
            fail_transfer: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, call: &str) -> usize {
        self.calls().iter().filter(|c| c.as_str() == call).count()
    }

    fn record(&self, call: &str) {
        self.calls.lock().unwrap().push(call.to_string());
    }
}

#[async_trait]
impl PlaybackProvider for RecordingProvider {
    async fn transfer(&self, _host_id: &str, _device_id: &str, _play: bool) -> ApiResult<()> {
        self.record("transfer");
        if self.fail_transfer {
            return Err(ApiError::Playback("device not found".to_string()));
        }
        Ok(())
    }

    async fn play_uri(&self, _host_id: &str, _device_id: &str, uri: &str) -> ApiResult<()> {
        self.record("play_uri");
        *self.playing.lock().unwrap() = Some(uri.to_string());
        Ok(())
    }

    async fn resume(&self, _host_id: &str, _device_id: &str) -> ApiResult<()> {
        self.record("resume");
        Ok(())
    }

    async fn pause(&self, _host_id: &str, _device_id: Option<&str>) -> ApiResult<()> {
        self.record("pause");
        Ok(())
    }

    async fn enqueue_and_skip(&self, _host_id: &str, _device_id: &str, uri: &str) -> ApiResult<()> {
        self.record("enqueue_and_skip");
        *self.playing.lock().unwrap() = Some(uri.to_string());
        Ok(())
    }

    async fn currently_playing(&self, _host_id: &str) -> ApiResult<PlaybackState> {
        self.record("currently_playing");
        let uri = self.playing.lock().unwrap().clone();
        Ok(PlaybackState {
            is_playing: uri.is_some(),
            uri,
        })
    }

    async fn set_volume(&self, _host_id: &str, _device_id: &str, _percent: u8) -> ApiResult<()> {
        self.record("set_volume");
        Ok(())
    }
}

pub fn test_settings() -> GameSettings {
    GameSettings {
        min_deck_size: 4,
        default_target_points: 3,
        queue_debounce: Duration::from_secs(5),
        provider_timeout: Duration::from_secs(1),
        ..GameSettings::default()
    }
}

/// Application context over in-memory collaborators with millisecond retries
pub fn test_context(
    tracks: Vec<CatalogTrack>,
    provider: Arc<RecordingProvider>,
) -> AppContext {
    test_context_with_catalog(Arc::new(FakeCatalog::new(tracks)), provider)
}

pub fn test_context_with_catalog(
    catalog: Arc<FakeCatalog>,
    provider: Arc<RecordingProvider>,
) -> AppContext {
    AppContext::new(
        catalog,
        provider,
        None,
        test_settings(),
        RetryPolicy::from_millis(&[1, 1]),
    )
}
