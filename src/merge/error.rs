//! Error types for checkpoint loading and merging.

use safetensors::Dtype;
use thiserror::Error;

/// Errors that can occur while loading, merging, or saving checkpoints.
#[derive(Debug, Error)]
pub enum MergeError {
    /// Shared parameter with different shapes in model A and model B.
    #[error("Shape mismatch for tensor '{key}': model A has {expected:?}, model B has {actual:?}")]
    ShapeMismatch {
        key: String,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    /// Shared parameter whose element types cannot be blended.
    #[error("Cannot blend tensor '{key}': model A is {dtype_a:?}, model B is {dtype_b:?}")]
    UnsupportedDtype {
        key: String,
        dtype_a: Dtype,
        dtype_b: Dtype,
    },

    /// Reading a checkpoint from disk failed.
    #[error("Failed to read checkpoint '{path}': {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    /// Persisting a merged checkpoint failed.
    #[error("Failed to write checkpoint '{path}': {source}")]
    Write {
        path: String,
        source: std::io::Error,
    },

    /// The file is not a usable checkpoint.
    #[error("Invalid checkpoint: {0}")]
    InvalidCheckpoint(String),

    /// Safetensors (de)serialization error.
    #[error("Safetensors error: {0}")]
    Safetensors(#[from] safetensors::SafeTensorError),
}
