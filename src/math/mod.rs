//! Mathematical utilities: the easing curves that reshape alpha progressions.

pub mod curves;

pub use curves::*;
