//! Bounded polling with an explicit delay schedule

use std::future::Future;
use std::time::Duration;

/// Delays used when polling the playback provider after a command
pub const PLAYBACK_POLL_DELAYS_MS: [u64; 5] = [200, 400, 800, 1200, 1600];

/// Retry schedule: wait each delay in turn, then probe
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    delays: Vec<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_millis(&PLAYBACK_POLL_DELAYS_MS)
    }
}

impl RetryPolicy {
    pub fn new(delays: Vec<Duration>) -> Self {
        Self { delays }
    }

    pub fn from_millis(delays: &[u64]) -> Self {
        Self::new(delays.iter().copied().map(Duration::from_millis).collect())
    }

    /// Same schedule capped to its first probe
    pub fn first_only(&self) -> Self {
        Self::new(self.delays.iter().take(1).copied().collect())
    }

    pub fn max_attempts(&self) -> usize {
        self.delays.len()
    }

    /// Probe until it reports success or the schedule runs out
    ///
    /// Returns the 1-based attempt that succeeded.
    pub async fn poll_until<F, Fut>(&self, mut probe: F) -> Option<usize>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = bool>,
    {
        for (attempt, delay) in self.delays.iter().enumerate() {
            tokio::time::sleep(*delay).await;
            if probe().await {
                return Some(attempt + 1);
            }
            tracing::trace!(attempt = attempt + 1, "Probe not yet satisfied");
        }
        None
    }
}
