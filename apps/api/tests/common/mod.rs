//! Common test utilities for API integration tests
//!
//! In-memory collaborators, room setup shortcuts and response helpers.

#![allow(unused_imports)]

pub mod fixtures;
pub mod helpers;

pub use fixtures::*;
pub use helpers::*;
