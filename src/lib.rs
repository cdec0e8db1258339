//! `batch-ckpt-merge` library crate.
//!
//! The binary (`bcm`) is a thin wrapper around this library so that:
//!
//! - the merge engine is testable without spawning processes
//! - modules are reusable (e.g., scripting a sweep from another tool)
//! - code stays easy to navigate as the project grows

pub mod app;
pub mod cli;
pub mod data;
pub mod domain;
pub mod error;
pub mod io;
pub mod math;
pub mod merge;
pub mod models;
pub mod plot;
pub mod report;
pub mod sequence;
pub mod tui;
