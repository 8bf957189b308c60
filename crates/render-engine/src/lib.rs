//! GridSync Render Engine
//!
//! Composites the sources of a grid layout into single frames and exports
//! the synchronized grid as one video at a chosen speed.
//!
//! # Pipeline Architecture
//!
//! ```text
//! clip_a.mp4 ──► VideoSource ──┐
//! clip_b.mp4 ──► VideoSource ──┤
//! clip_c.mp4 ──► VideoSource ──┼── FrameCompositor (cells + labels)
//! clip_d.mp4 ──► VideoSource ──┘         │
//!                                        ├──► display sink (preview)
//!                                        │
//!                       SamplingPlan ────┴──► SpeedAwareExporter
//!                      (skip / repeat)               │
//!                                                    ▼
//!                                       clip_a_comparison_x2p0.mp4
//! ```

pub mod compositor;
pub mod export;
pub mod source_set;

pub use compositor::{FrameCompositor, LabelRenderer};
pub use export::*;
pub use source_set::{LoadReport, SourceSet};
