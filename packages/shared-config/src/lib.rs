//! Shared configuration types for Songline services
//!
//! This crate provides common configuration types used by the API server
//! and its external-service integrations.

mod error;
mod spotify;

pub use error::{ConfigError, ConfigResult};
pub use spotify::SpotifyConfig;

use std::env;

/// Common configuration shared between all services
#[derive(Debug, Clone)]
pub struct CommonConfig {
    /// Spotify integration configuration (optional)
    pub spotify: Option<SpotifyConfig>,

    /// Environment mode (development, staging, production)
    pub environment: Environment,

    /// Log level (from RUST_LOG or LOG_LEVEL)
    pub log_level: String,
}

/// Application environment mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl std::str::FromStr for Environment {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            "staging" | "stage" => Self::Staging,
            _ => Self::Development,
        })
    }
}

impl Environment {
    /// Check if this is a production environment
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    /// Check if this is a development environment
    pub fn is_development(&self) -> bool {
        matches!(self, Self::Development)
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Development => write!(f, "development"),
            Self::Staging => write!(f, "staging"),
            Self::Production => write!(f, "production"),
        }
    }
}

impl CommonConfig {
    /// Load common configuration from environment variables
    ///
    /// Spotify is optional: a missing client id disables it, but a present
    /// and malformed configuration is an error.
    pub fn from_env() -> ConfigResult<Self> {
        let spotify = match SpotifyConfig::from_env() {
            Ok(config) => Some(config),
            Err(ConfigError::MissingEnvVar(_)) => None,
            Err(e) => return Err(e),
        };

        Ok(Self {
            spotify,
            environment: env::var("ENVIRONMENT")
                .unwrap_or_else(|_| "development".to_string())
                .parse()
                .unwrap_or_default(),
            log_level: env::var("RUST_LOG")
                .or_else(|_| env::var("LOG_LEVEL"))
                .unwrap_or_else(|_| "info".to_string()),
        })
    }

    /// Check if the Spotify integration is configured
    pub fn has_spotify(&self) -> bool {
        self.spotify.is_some()
    }
}

/// Helper function to get a required environment variable
pub fn get_required_env(name: &str) -> ConfigResult<String> {
    match env::var(name) {
        Ok(value) if !value.is_empty() => Ok(value),
        _ => Err(ConfigError::MissingEnvVar(name.to_string())),
    }
}

/// Helper function to get an optional environment variable with a default
pub fn get_env_or_default(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

/// Helper function to parse an environment variable into a specific type
pub fn parse_env<T>(name: &str, default: T) -> ConfigResult<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(val) => val
            .parse()
            .map_err(|e| ConfigError::InvalidValue(name.to_string(), format!("{}", e))),
        Err(_) => Ok(default),
    }
}
