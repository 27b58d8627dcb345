//! API server configuration

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use songline_shared_config::{get_env_or_default, parse_env, CommonConfig, Environment};

/// Smallest playable deck a game may start with
pub const DEFAULT_MIN_DECK_SIZE: usize = 30;

/// API server configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Common configuration shared with other services
    pub common: CommonConfig,

    /// Server port (default: 8080)
    pub port: u16,

    /// CORS allowed origins (optional)
    pub cors_allowed_origins: Option<Vec<String>>,

    /// Local JSON deck used when Spotify is not configured
    pub deck_file: Option<PathBuf>,

    /// Gameplay tuning
    pub game: GameSettings,
}

/// Gameplay and playback tuning knobs
#[derive(Debug, Clone)]
pub struct GameSettings {
    /// Minimum number of playable cards required to start
    pub min_deck_size: usize,
    /// Target score when a room is created without one
    pub default_target_points: u32,
    /// Playlist used when `start` does not name one
    pub default_playlist_id: Option<String>,
    /// Window in which an identical queue-next request is a duplicate
    pub queue_debounce: Duration,
    /// Upper bound on a single playback provider call
    pub provider_timeout: Duration,
    /// Rooms untouched for this long are evicted
    pub room_idle_ttl: Duration,
    /// How often the eviction task runs
    pub cleanup_interval: Duration,
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            min_deck_size: DEFAULT_MIN_DECK_SIZE,
            default_target_points: 10,
            default_playlist_id: None,
            queue_debounce: Duration::from_millis(1500),
            provider_timeout: Duration::from_secs(5),
            room_idle_ttl: Duration::from_secs(4 * 60 * 60),
            cleanup_interval: Duration::from_secs(5 * 60),
        }
    }
}

impl GameSettings {
    /// Load gameplay settings, falling back to defaults for unset variables
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let default_target_points: u32 =
            parse_env("DEFAULT_TARGET_POINTS", defaults.default_target_points)
                .context("Invalid DEFAULT_TARGET_POINTS value")?;
        if !(1..=100).contains(&default_target_points) {
            bail!(
                "DEFAULT_TARGET_POINTS must be between 1 and 100 (got {})",
                default_target_points
            );
        }

        let min_deck_size: usize = parse_env("MIN_DECK_SIZE", defaults.min_deck_size)
            .context("Invalid MIN_DECK_SIZE value")?;
        if min_deck_size == 0 {
            bail!("MIN_DECK_SIZE must be at least 1");
        }

        Ok(Self {
            min_deck_size,
            default_target_points,
            default_playlist_id: env::var("DEFAULT_PLAYLIST_ID")
                .ok()
                .filter(|s| !s.is_empty()),
            queue_debounce: Duration::from_millis(
                parse_env("QUEUE_DEBOUNCE_MS", 1500u64).context("Invalid QUEUE_DEBOUNCE_MS")?,
            ),
            provider_timeout: Duration::from_secs(
                parse_env("PROVIDER_TIMEOUT_SECS", 5u64)
                    .context("Invalid PROVIDER_TIMEOUT_SECS")?,
            ),
            room_idle_ttl: Duration::from_secs(
                parse_env("ROOM_IDLE_TTL_SECS", 4 * 60 * 60u64)
                    .context("Invalid ROOM_IDLE_TTL_SECS")?,
            ),
            cleanup_interval: Duration::from_secs(
                parse_env("CLEANUP_INTERVAL_SECS", 5 * 60u64)
                    .context("Invalid CLEANUP_INTERVAL_SECS")?,
            ),
        })
    }
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// In production a card source must exist: either Spotify credentials or
    /// a `DECK_FILE`. In development the server starts without one and
    /// `start` fails until a source is configured.
    pub fn from_env() -> Result<Self> {
        let environment = Environment::from_str(&get_env_or_default("ENVIRONMENT", "development"))
            .unwrap_or_default();

        let common = CommonConfig::from_env()
            .map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;

        let deck_file = env::var("DECK_FILE")
            .ok()
            .filter(|s| !s.is_empty())
            .map(PathBuf::from);

        if environment.is_production() && !common.has_spotify() && deck_file.is_none() {
            bail!(
                "No card source configured. Set SPOTIFY_CLIENT_ID/SPOTIFY_CLIENT_SECRET \
                 or DECK_FILE in production."
            );
        }

        Ok(Self {
            common,

            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .context("Invalid PORT value")?,

            cors_allowed_origins: env::var("CORS_ORIGINS").ok().map(|s| {
                s.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            }),

            deck_file,

            game: GameSettings::from_env()?,
        })
    }

    /// Get environment mode
    pub fn environment(&self) -> Environment {
        self.common.environment
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.common.environment.is_production()
    }
}
