//! Spotify Web API client for Songline
//!
//! This crate provides a client for the parts of the Spotify Web API the
//! game server needs:
//! - Playlist track listing (deck building)
//! - Player control (transfer, play, pause, queue, skip, volume)
//! - Currently-playing queries
//! - Access token refresh
//!
//! # Example
//!
//! ```rust,no_run
//! use songline_spotify_client::SpotifyClient;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = SpotifyClient::new("client_id", "client_secret")?;
//!
//! let tracks = client
//!     .playlist_tracks("access_token", "37i9dQZF1DXbTxeAdrVG2l", None)
//!     .await?;
//! println!("{} tracks", tracks.len());
//!
//! let now = client.currently_playing("access_token").await?;
//! println!("playing: {:?}", now.uri);
//! # Ok(())
//! # }
//! ```
//!
//! # Environment Variables
//!
//! - `SPOTIFY_CLIENT_ID`: application client id (required by `from_env`)
//! - `SPOTIFY_CLIENT_SECRET`: application client secret (required by `from_env`)

mod client;
mod error;
mod models;

pub use client::SpotifyClient;
pub use error::{SpotifyError, SpotifyResult};
pub use models::{NowPlaying, SpotifyTrack, TokenSet};
