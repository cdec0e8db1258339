//! Easing curves for alpha progressions.
//!
//! Every curve maps `0 -> 0` and `1 -> 1` and is monotonic on `[0, 1]`. Higher
//! orders flatten more derivatives at both endpoints:
//!
//! - `smoothstep(x)    = 3x² − 2x³`                    (f' = 0 at 0 and 1)
//! - `smootherstep(x)  = 6x⁵ − 15x⁴ + 10x³`            (f', f'' = 0)
//! - `smootheststep(x) = −20x⁷ + 70x⁶ − 84x⁵ + 35x⁴`  (f', f'', f''' = 0)
//!
//! The polynomials are evaluated as-is outside `[0, 1]`. Batch ranges are
//! allowed to leave the unit interval, in which case the curve extrapolates
//! instead of clamping.

/// Identity curve, used by the `Exact` interpolation model.
pub fn linear(x: f64) -> f64 {
    x
}

/// Cubic Hermite easing.
pub fn smoothstep(x: f64) -> f64 {
    x * x * (3.0 - 2.0 * x)
}

/// Quintic easing (Perlin's smootherstep).
pub fn smootherstep(x: f64) -> f64 {
    x * x * x * (x * (x * 6.0 - 15.0) + 10.0)
}

/// Septic easing.
pub fn smootheststep(x: f64) -> f64 {
    // Horner form of -20x^7 + 70x^6 - 84x^5 + 35x^4.
    let x4 = x * x * x * x;
    x4 * (35.0 + x * (-84.0 + x * (70.0 - 20.0 * x)))
}
