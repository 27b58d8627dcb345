//! Shared test utilities for Songline workspace
//!
//! This crate provides mock implementations of external services for testing
//! without network dependencies.
//!
//! # Mock Services
//!
//! - [`MockSpotifyServer`] - Mock Spotify Web API and accounts service
//!
//! # Example
//!
//! ```rust,ignore
//! use songline_test_utils::{MockSpotifyServer, SpotifyTrackFixture};
//!
//! #[tokio::test]
//! async fn test_with_mocks() {
//!     let spotify = MockSpotifyServer::start().await;
//!     spotify
//!         .mock_playlist_tracks("abc", vec![SpotifyTrackFixture::new("t1", "1999")])
//!         .await;
//!
//!     // Use spotify.url() to configure your client
//! }
//! ```

mod spotify;

pub use spotify::{MockSpotifyServer, SpotifyTrackFixture};
