//! GridSync Grid Model
//!
//! Defines the pure data contracts of a comparison grid:
//! - **Layout:** `RxC` grid specs and the cell rectangles they produce
//! - **Speed:** playback/export speed multipliers
//! - **Sampling:** how a logical frame timeline maps to output frames
//! - **Naming:** output file naming and recognised source extensions
//!
//! This crate is pure computation with no I/O.

pub mod layout;
pub mod naming;
pub mod sampling;
pub mod speed;

pub use layout::*;
pub use naming::*;
pub use sampling::*;
pub use speed::*;
