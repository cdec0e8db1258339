//! Interpolation model dispatch.
//!
//! Curves are implemented as small, pure functions (`math::curves`) so that the
//! sequencer and the plots can stay generic over the selected model.

pub mod curve;

pub use curve::*;
