//! Test utilities and helpers
//!
//! Fixtures for parties and node networks, and timeout helpers for async
//! tests. Shared by unit tests and the integration tests under `tests/`.

pub mod async_helpers;
pub mod fixtures;

pub use async_helpers::*;
pub use fixtures::*;
