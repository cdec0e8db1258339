//! Domain types used throughout the batch pipeline.
//!
//! This module defines:
//!
//! - closed configuration enums (`InterpolationModel`, `Precision`)
//! - the alpha progression (`AlphaStep`, `AlphaSequence`)
//! - the run configuration derived from CLI flags or the TUI (`BatchConfig`)

pub mod types;

pub use types::*;
