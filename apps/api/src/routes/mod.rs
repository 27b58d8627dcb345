//! HTTP route handlers for the Songline API
//!
//! - Room creation and snapshots
//! - Turn actions
//! - Playback queueing
//! - Host credentials
//! - Health checks

pub mod health;
pub mod hosts;
pub mod playback;
pub mod rooms;
pub mod turns;

pub use health::{health_router, HealthState};
pub use hosts::{hosts_router, HostsState};
pub use playback::{playback_router, PlaybackState};
pub use rooms::{rooms_router, RoomsState};
pub use turns::{turns_router, TurnsState};
