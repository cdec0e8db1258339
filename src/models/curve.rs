//! Map an [`InterpolationModel`] to its easing curve.

use crate::domain::InterpolationModel;
use crate::math::{linear, smootherstep, smootheststep, smoothstep};

/// Curve function for the given model. `Exact` is the identity.
pub fn curve_for(model: InterpolationModel) -> fn(f64) -> f64 {
    match model {
        InterpolationModel::Exact => linear,
        InterpolationModel::SmoothStep => smoothstep,
        InterpolationModel::SmootherStep => smootherstep,
        InterpolationModel::SmoothestStep => smootheststep,
    }
}

/// Evaluate the model's curve at `x`.
pub fn evaluate(model: InterpolationModel, x: f64) -> f64 {
    curve_for(model)(x)
}
