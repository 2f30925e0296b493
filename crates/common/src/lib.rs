//! SizeSnapper Common Utilities
//!
//! Shared infrastructure for all SizeSnapper crates:
//! - Error types and result aliases
//! - Timestamp helpers for record bookkeeping
//! - Tracing/logging initialization
//! - Configuration loading

pub mod clock;
pub mod config;
pub mod error;
pub mod logging;

pub use clock::*;
pub use config::*;
pub use error::*;
