//! Alpha progression generation.

pub mod alpha_grid;

pub use alpha_grid::*;
