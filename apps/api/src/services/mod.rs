//! Game services for Songline
//!
//! This module contains the core game logic:
//! - Room registry and seat assignment
//! - Deck building from a catalog source
//! - Timeline placement validation
//! - The turn state machine
//! - Playback reconciliation against an external provider
//! - The Spotify adapter for catalog and playback

pub mod coordinator;
pub mod deck;
pub mod playback;
pub mod registry;
pub mod retry;
pub mod spotify;
pub mod timeline;

pub use coordinator::{ConfirmPlacement, PlacementResult, QueueNextRequest, TurnCoordinator};
pub use deck::{CatalogSource, DeckEngine, JsonFileCatalog, UnconfiguredCatalog};
pub use playback::{
    PlaybackProvider, PlaybackReconciler, PlaybackState, QueueOutcome, ReconcileVia, StepKind,
    UnconfiguredPlayback,
};
pub use registry::{JoinRequest, RoomCreated, RoomRegistry};
pub use retry::RetryPolicy;
pub use spotify::SpotifyService;
