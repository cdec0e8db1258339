//! Pairwise weight merging.
//!
//! - tensors with dtype-aware blending and downcasting (`tensor`)
//! - the three-phase state-dict merge (`merger`)
//! - engine errors (`error`)

pub mod error;
pub mod merger;
pub mod tensor;

pub use error::*;
pub use merger::*;
pub use tensor::*;
