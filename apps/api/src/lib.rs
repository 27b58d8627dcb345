//! Songline API library
//!
//! Exposes the game server components for the binary and for integration
//! tests.

pub mod app;
pub mod config;
pub mod error;
pub mod models;
pub mod routes;
pub mod services;
pub mod websocket;

// Re-export commonly used types
pub use app::AppContext;
pub use error::{ApiError, ApiResult, ErrorResponse};
pub use services::TurnCoordinator;
