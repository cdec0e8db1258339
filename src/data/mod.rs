//! Synthetic inputs for trying the merger without real model files.

pub mod synthetic;

pub use synthetic::*;
