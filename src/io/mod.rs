//! Input/output helpers.
//!
//! - checkpoint read/write and folder listing (`checkpoint`)
//! - output names and batch manifests (`manifest`)
//! - remembered front-end settings (`settings`)

pub mod checkpoint;
pub mod manifest;
pub mod settings;

pub use checkpoint::*;
pub use manifest::*;
pub use settings::*;
