//! Alpha sequence generation.
//!
//! A batch walks model B's weight from `start` in fixed increments of `step`.
//! Each position carries two fractions:
//!
//! - the raw fraction, rounded to 2 decimals, which names the output file
//! - the effective fraction, the raw fraction reshaped by the interpolation
//!   curve, which is the actual merge weight
//!
//! Raw values are generated by index (`start + i * step`) rather than by
//! accumulating `step`, so a batch always has exactly `count` positions and
//! float drift cannot add or drop one at the upper bound.

use crate::domain::{AlphaParams, AlphaSequence, AlphaStep, InterpolationModel};
use crate::error::AppError;
use crate::models::curve_for;

/// Number of points in the reference grid drawn behind curve previews.
pub const DEMO_GRID_POINTS: usize = 101;

/// Build the alpha sequence for a batch.
///
/// `step` may be zero or negative (a constant or decreasing sequence); values
/// outside `[0, 1]` are kept as-is.
pub fn sequence(
    start: f64,
    step: f64,
    count: usize,
    model: InterpolationModel,
) -> Result<AlphaSequence, AppError> {
    if !(start.is_finite() && step.is_finite()) {
        return Err(AppError::new(
            2,
            format!("Invalid alpha range: start={start}, step={step} (must be finite)."),
        ));
    }
    if count < 1 {
        return Err(AppError::new(2, "Number of steps must be >= 1."));
    }

    let curve = curve_for(model);
    let steps = (0..count)
        .map(|i| {
            let raw = round2(start + i as f64 * step);
            AlphaStep {
                raw,
                effective: curve(raw),
            }
        })
        .collect();

    Ok(AlphaSequence { model, steps })
}

/// [`sequence`] from a bundled parameter set.
pub fn sequence_from(params: &AlphaParams) -> Result<AlphaSequence, AppError> {
    sequence(params.start, params.step, params.count, params.model)
}

/// Last raw fraction of a batch (`start + (count - 1) * step`).
pub fn batch_end(start: f64, step: f64, count: usize) -> f64 {
    start + count.saturating_sub(1) as f64 * step
}

/// Round to 2 decimals, ties to even.
pub fn round2(x: f64) -> f64 {
    (x * 100.0).round_ties_even() / 100.0
}

/// `0.00, 0.01, ..., 1.00`: the input grid used to draw a full curve.
pub fn demo_grid() -> Vec<f64> {
    (0..DEMO_GRID_POINTS)
        .map(|i| round2(i as f64 / (DEMO_GRID_POINTS as f64 - 1.0)))
        .collect()
}
