//! framestitch common utilities
//!
//! Shared infrastructure for all framestitch crates:
//! - Error taxonomy and result alias
//! - Tracing/logging initialization
//! - Configuration loading

pub mod config;
pub mod error;
pub mod logging;

pub use config::*;
pub use error::*;
