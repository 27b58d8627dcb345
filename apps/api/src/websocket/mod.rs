//! Real-time room channel
//!
//! - `handler`: socket upgrade and the per-connection send/receive loop
//! - `dispatch`: client event routing into the turn coordinator
//! - `connection`: per-room fan-out
//! - `messages`: wire envelopes

pub mod connection;
pub mod dispatch;
pub mod handler;
pub mod messages;

pub use connection::RoomBroadcaster;
pub use dispatch::RoomEventHandler;
pub use handler::ws_handler;
pub use messages::{ClientEvent, ServerEvent};
