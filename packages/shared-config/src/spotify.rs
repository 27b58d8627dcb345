//! Spotify Web API configuration types

use crate::{get_env_or_default, get_required_env, parse_env, ConfigError, ConfigResult};

/// Default Spotify Web API base URL
const DEFAULT_API_URL: &str = "https://api.spotify.com";

/// Default Spotify accounts service URL (token refresh)
const DEFAULT_ACCOUNTS_URL: &str = "https://accounts.spotify.com";

/// Spotify application credentials and endpoints
#[derive(Clone)]
pub struct SpotifyConfig {
    /// OAuth client ID of the registered application
    pub client_id: String,

    /// OAuth client secret of the registered application
    pub client_secret: String,

    /// Web API base URL
    pub api_url: String,

    /// Accounts service base URL
    pub accounts_url: String,

    /// Market used when fetching playlist tracks (ISO 3166-1 alpha-2)
    pub market: Option<String>,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl std::fmt::Debug for SpotifyConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpotifyConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("api_url", &self.api_url)
            .field("accounts_url", &self.accounts_url)
            .field("market", &self.market)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl SpotifyConfig {
    /// Load Spotify configuration from environment variables
    ///
    /// `SPOTIFY_CLIENT_ID` and `SPOTIFY_CLIENT_SECRET` are required.
    pub fn from_env() -> ConfigResult<Self> {
        let api_url = get_env_or_default("SPOTIFY_API_URL", DEFAULT_API_URL);
        let accounts_url = get_env_or_default("SPOTIFY_ACCOUNTS_URL", DEFAULT_ACCOUNTS_URL);
        validate_url("SPOTIFY_API_URL", &api_url)?;
        validate_url("SPOTIFY_ACCOUNTS_URL", &accounts_url)?;

        Ok(Self {
            client_id: get_required_env("SPOTIFY_CLIENT_ID")?,
            client_secret: get_required_env("SPOTIFY_CLIENT_SECRET")?,
            api_url,
            accounts_url,
            market: std::env::var("SPOTIFY_MARKET")
                .ok()
                .filter(|s| !s.is_empty()),
            timeout_secs: parse_env("SPOTIFY_TIMEOUT", 10)?,
        })
    }

    /// Create a configuration pointing both endpoints at one base URL (useful for testing)
    pub fn with_base_url(url: impl Into<String>) -> Self {
        let url = url.into();
        Self {
            client_id: "test-client".to_string(),
            client_secret: "test-secret".to_string(),
            api_url: url.clone(),
            accounts_url: url,
            market: None,
            timeout_secs: 10,
        }
    }

    /// Get the full URL for the token endpoint
    pub fn token_url(&self) -> String {
        format!("{}/api/token", self.accounts_url.trim_end_matches('/'))
    }
}

fn validate_url(name: &str, value: &str) -> ConfigResult<()> {
    if value.starts_with("http://") || value.starts_with("https://") {
        Ok(())
    } else {
        Err(ConfigError::InvalidUrl(
            name.to_string(),
            format!("expected http(s) URL, got '{}'", value),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_base_url() {
        let config = SpotifyConfig::with_base_url("http://127.0.0.1:9999");
        assert_eq!(config.api_url, "http://127.0.0.1:9999");
        assert_eq!(config.accounts_url, "http://127.0.0.1:9999");
    }

    #[test]
    fn test_token_url_with_trailing_slash() {
        let config = SpotifyConfig::with_base_url("http://localhost:8888/");
        assert_eq!(config.token_url(), "http://localhost:8888/api/token");
    }

    #[test]
    fn test_debug_redacts_secret() {
        let config = SpotifyConfig::with_base_url("http://localhost");
        let debug = format!("{:?}", config);
        assert!(!debug.contains("test-secret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn test_validate_url() {
        assert!(validate_url("X", "https://api.spotify.com").is_ok());
        assert!(matches!(
            validate_url("X", "api.spotify.com"),
            Err(ConfigError::InvalidUrl(_, _))
        ));
    }
}
