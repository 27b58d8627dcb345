//! Spotify API error types

use thiserror::Error;

/// Spotify API client errors
#[derive(Error, Debug)]
pub enum SpotifyError {
    /// Client credentials are missing
    #[error("client id and secret are required for Spotify API access")]
    MissingCredentials,

    /// Invalid input provided to API method
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing failed
    #[error("Failed to parse Spotify response: {0}")]
    Parse(#[from] serde_json::Error),

    /// Spotify API returned an error
    #[error("Spotify API error {status}: {message}")]
    Api { status: u16, message: String },

    /// Access token expired or was rejected
    #[error("Spotify access token rejected")]
    Unauthorized,

    /// Refreshing the access token failed
    #[error("Spotify token refresh failed: {0}")]
    TokenRefresh(String),

    /// Requested resource (playlist, device) not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Rate limited by Spotify
    #[error("Rate limited by Spotify API, retry after {retry_after} seconds")]
    RateLimited { retry_after: u64 },

    /// Request timeout
    #[error("Request to Spotify timed out")]
    Timeout,
}

impl SpotifyError {
    /// Check if this error is retryable (transient failure)
    ///
    /// Retries on timeouts, rate limiting, transport errors and 5xx.
    /// Authentication failures are not retried here: the caller refreshes
    /// the token and replays the request itself.
    pub fn is_retryable(&self) -> bool {
        match self {
            SpotifyError::Timeout | SpotifyError::RateLimited { .. } => true,
            SpotifyError::Api { status, .. } => *status >= 500,
            SpotifyError::Http(e) => {
                if e.is_timeout() || e.is_connect() {
                    return true;
                }
                matches!(e.status(), Some(status) if status.is_server_error())
            }
            _ => false,
        }
    }

    /// Check if this error means the access token must be refreshed
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, SpotifyError::Unauthorized)
    }
}

/// Result type for Spotify operations
pub type SpotifyResult<T> = Result<T, SpotifyError>;
