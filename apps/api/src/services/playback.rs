//! Playback provider contract and queue reconciliation
//!
//! Provider commands are eventually consistent: a queue+skip is not
//! guaranteed to show up in the next "currently playing" read. The
//! [`PlaybackReconciler`] drives a fixed ladder of commands and polls with a
//! [`RetryPolicy`] until the observed state matches the target track.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::error::{ApiError, ApiResult};
use crate::services::retry::RetryPolicy;

/// What the provider reports as playing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaybackState {
    pub uri: Option<String>,
    pub is_playing: bool,
}

impl PlaybackState {
    pub fn is_playing_uri(&self, uri: &str) -> bool {
        self.is_playing && self.uri.as_deref() == Some(uri)
    }
}

/// External music playback control, per host account
#[async_trait]
pub trait PlaybackProvider: Send + Sync {
    /// Make `device_id` the active device, optionally starting playback
    async fn transfer(&self, host_id: &str, device_id: &str, play: bool) -> ApiResult<()>;

    async fn play_uri(&self, host_id: &str, device_id: &str, uri: &str) -> ApiResult<()>;

    async fn resume(&self, host_id: &str, device_id: &str) -> ApiResult<()>;

    async fn pause(&self, host_id: &str, device_id: Option<&str>) -> ApiResult<()>;

    /// Queue `uri` and skip to it
    async fn enqueue_and_skip(&self, host_id: &str, device_id: &str, uri: &str) -> ApiResult<()>;

    async fn currently_playing(&self, host_id: &str) -> ApiResult<PlaybackState>;

    async fn set_volume(&self, host_id: &str, device_id: &str, percent: u8) -> ApiResult<()>;
}

/// Provider used when no music account integration is configured
#[derive(Debug, Clone, Copy, Default)]
pub struct UnconfiguredPlayback;

impl UnconfiguredPlayback {
    fn unavailable<T>() -> ApiResult<T> {
        Err(ApiError::Configuration(
            "no playback provider configured".to_string(),
        ))
    }
}

#[async_trait]
impl PlaybackProvider for UnconfiguredPlayback {
    async fn transfer(&self, _host_id: &str, _device_id: &str, _play: bool) -> ApiResult<()> {
        Self::unavailable()
    }

    async fn play_uri(&self, _host_id: &str, _device_id: &str, _uri: &str) -> ApiResult<()> {
        Self::unavailable()
    }

    async fn resume(&self, _host_id: &str, _device_id: &str) -> ApiResult<()> {
        Self::unavailable()
    }

    async fn pause(&self, _host_id: &str, _device_id: Option<&str>) -> ApiResult<()> {
        Self::unavailable()
    }

    async fn enqueue_and_skip(&self, _host_id: &str, _device_id: &str, _uri: &str) -> ApiResult<()> {
        Self::unavailable()
    }

    async fn currently_playing(&self, _host_id: &str) -> ApiResult<PlaybackState> {
        Self::unavailable()
    }

    async fn set_volume(&self, _host_id: &str, _device_id: &str, _percent: u8) -> ApiResult<()> {
        Self::unavailable()
    }
}

/// Whether a failed provider call aborts the operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    /// Failure propagates to the caller
    Critical,
    /// Failure is logged and ignored
    BestEffort,
}

/// Which rung of the ladder confirmed playback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ReconcileVia {
    Queue,
    PlayUri,
    Resume,
}

/// Result of a queue-next request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum QueueOutcome {
    /// The provider reports the target track playing
    Reconciled { via: ReconcileVia },
    /// Same target requested inside the debounce window
    Duplicate,
    /// Every rung ran but the provider never confirmed
    Unconfirmed,
}

impl QueueOutcome {
    pub fn is_confirmed(&self) -> bool {
        matches!(self, Self::Reconciled { .. })
    }
}

/// A queue request after room validation
#[derive(Debug, Clone)]
pub struct QueueTarget {
    pub host_id: String,
    pub turn_id: String,
    pub device_id: String,
    pub uri: String,
    pub volume_percent: Option<u8>,
}

type TurnKey = (String, String);

/// Serializes and reconciles playback commands per (host, turn)
pub struct PlaybackReconciler {
    provider: Arc<dyn PlaybackProvider>,
    call_timeout: Duration,
    debounce: Duration,
    retry: RetryPolicy,
    recent: DashMap<TurnKey, (String, Instant)>,
    locks: DashMap<TurnKey, Arc<Mutex<()>>>,
}

impl std::fmt::Debug for PlaybackReconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackReconciler")
            .field("call_timeout", &self.call_timeout)
            .field("debounce", &self.debounce)
            .field("retry", &self.retry)
            .field("tracked_turns", &self.recent.len())
            .finish()
    }
}

impl PlaybackReconciler {
    pub fn new(
        provider: Arc<dyn PlaybackProvider>,
        call_timeout: Duration,
        debounce: Duration,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            provider,
            call_timeout,
            debounce,
            retry,
            recent: DashMap::new(),
            locks: DashMap::new(),
        }
    }

    pub fn provider(&self) -> &Arc<dyn PlaybackProvider> {
        &self.provider
    }

    /// Run one provider call under the timeout, honoring its criticality
    ///
    /// Best-effort failures come back as `Ok(None)`.
    async fn step<T, Fut>(&self, kind: StepKind, label: &'static str, call: Fut) -> ApiResult<Option<T>>
    where
        Fut: Future<Output = ApiResult<T>>,
    {
        let result = match tokio::time::timeout(self.call_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(ApiError::Timeout(label)),
        };

        match (result, kind) {
            (Ok(value), _) => Ok(Some(value)),
            (Err(e), StepKind::Critical) => {
                warn!(step = label, error = %e, "Critical playback step failed");
                Err(e)
            }
            (Err(e), StepKind::BestEffort) => {
                debug!(step = label, error = %e, "Best-effort playback step failed");
                Ok(None)
            }
        }
    }

    async fn observe(&self, host_id: &str, uri: &str) -> bool {
        let state = self
            .step(
                StepKind::BestEffort,
                "currently playing",
                self.provider.currently_playing(host_id),
            )
            .await
            .ok()
            .flatten();
        state.is_some_and(|s| s.is_playing_uri(uri))
    }

    async fn confirm(&self, policy: &RetryPolicy, host_id: &str, uri: &str) -> bool {
        policy
            .poll_until(|| self.observe(host_id, uri))
            .await
            .is_some()
    }

    /// Returns true when the same target was queued inside the window
    fn is_duplicate(&self, key: &TurnKey, uri: &str) -> bool {
        let now = Instant::now();
        match self.recent.entry(key.clone()) {
            Entry::Occupied(mut entry) => {
                let (last_uri, at) = entry.get();
                if last_uri == uri && now.duration_since(*at) < self.debounce {
                    return true;
                }
                entry.insert((uri.to_string(), now));
            }
            Entry::Vacant(entry) => {
                entry.insert((uri.to_string(), now));
            }
        }
        false
    }

    /// Bring the host's device to `target.uri`
    ///
    /// # Errors
    /// Only critical steps propagate: transferring playback to the device.
    #[instrument(skip(self, target), fields(host_id = %target.host_id, turn_id = %target.turn_id))]
    pub async fn queue_next(&self, target: &QueueTarget) -> ApiResult<QueueOutcome> {
        let key = (target.host_id.clone(), target.turn_id.clone());
        if self.is_duplicate(&key, &target.uri) {
            debug!("Queue request debounced");
            return Ok(QueueOutcome::Duplicate);
        }

        let lock = self
            .locks
            .entry(key)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = lock.lock().await;

        let host = target.host_id.as_str();
        let device = target.device_id.as_str();
        let uri = target.uri.as_str();

        self.step(StepKind::BestEffort, "pause", self.provider.pause(host, Some(device)))
            .await?;
        self.step(
            StepKind::Critical,
            "transfer playback",
            self.provider.transfer(host, device, false),
        )
        .await?;
        if let Some(percent) = target.volume_percent {
            self.step(
                StepKind::BestEffort,
                "set volume",
                self.provider.set_volume(host, device, percent.min(100)),
            )
            .await?;
        }

        let queued = self
            .step(
                StepKind::BestEffort,
                "enqueue and skip",
                self.provider.enqueue_and_skip(host, device, uri),
            )
            .await?;
        if queued.is_some() && self.confirm(&self.retry, host, uri).await {
            info!(via = "queue", "Playback reconciled");
            return Ok(QueueOutcome::Reconciled {
                via: ReconcileVia::Queue,
            });
        }

        let played = self
            .step(
                StepKind::BestEffort,
                "play uri",
                self.provider.play_uri(host, device, uri),
            )
            .await?;
        if played.is_some() && self.confirm(&self.retry, host, uri).await {
            info!(via = "play_uri", "Playback reconciled");
            return Ok(QueueOutcome::Reconciled {
                via: ReconcileVia::PlayUri,
            });
        }

        let resumed = self
            .step(StepKind::BestEffort, "resume", self.provider.resume(host, device))
            .await?;
        if resumed.is_some() && self.confirm(&self.retry.first_only(), host, uri).await {
            info!(via = "resume", "Playback reconciled");
            return Ok(QueueOutcome::Reconciled {
                via: ReconcileVia::Resume,
            });
        }

        warn!(uri, "Playback could not be confirmed");
        Ok(QueueOutcome::Unconfirmed)
    }

    /// Fire-and-forget pause used when a turn resolves
    pub fn spawn_pause(self: &Arc<Self>, host_id: String, device_id: Option<String>) {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            let _ = this
                .step(
                    StepKind::BestEffort,
                    "pause on result",
                    this.provider.pause(&host_id, device_id.as_deref()),
                )
                .await;
        });
    }

    /// Drop debounce and lock entries older than `max_age`
    pub fn evict_stale(&self, max_age: Duration) -> usize {
        let now = Instant::now();
        let before = self.recent.len();
        self.recent
            .retain(|_, (_, at)| now.duration_since(*at) < max_age);
        self.locks
            .retain(|key, lock| self.recent.contains_key(key) || Arc::strong_count(lock) > 1);
        before - self.recent.len()
    }
}
