//! GridSync Common Utilities
//!
//! Shared infrastructure for all GridSync crates:
//! - Error types and result aliases
//! - Frame pacing and progress throttling for playback and export loops
//! - Tracing/logging initialization
//! - Configuration loading

pub mod clock;
pub mod config;
pub mod error;
pub mod logging;

pub use clock::*;
pub use config::*;
pub use error::*;
