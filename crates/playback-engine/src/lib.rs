//! GridSync Playback
//!
//! Drives a loaded comparison: one shared frame index, a paced playback loop
//! pushing composited frames to a display, and background grid exports.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────┐
//! │                ComparisonSession                  │
//! │  paths + GridSpec + CanvasSize + SpeedMultiplier  │
//! │        │                          │               │
//! │        ▼                          ▼               │
//! │  SourceSet (preview)        start_export()        │
//! │        │                          │               │
//! │        ▼                          ▼               │
//! │  PlaybackController        worker thread:         │
//! │  (paced loop) ──► display  own SourceSet ──►      │
//! │                            SpeedAwareExporter     │
//! └───────────────────────────────────────────────────┘
//! ```

pub mod controller;
pub mod session;

pub use controller::*;
pub use session::*;
