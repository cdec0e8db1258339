//! Pairwise state-dict merge.
//!
//! Merging model B into model A at weight `alpha` runs three phases over the
//! keys that contain the parameter marker:
//!
//! 1. common weights: keys in both models are blended `(1 − alpha)·A + alpha·B`
//! 2. distinct weights: keys only in model B are copied over unchanged
//! 3. precision: with [`Precision::Half`] every marked float tensor
//!    becomes F16; non-float tensors keep their element type
//!
//! Keys without the marker keep model A's value and are never taken from B.
//! The phases are public so a caller can report progress between them;
//! [`Merger::merge`] runs all three on a fresh copy of model A.

use std::collections::BTreeMap;

use tracing::debug;

use crate::domain::{DEFAULT_PARAM_MARKER, Precision};
use crate::merge::{MergeError, Tensor};

/// Parameter name → tensor, in deterministic key order.
pub type ParamMap = BTreeMap<String, Tensor>;

/// Merge rules: which keys count as parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Merger {
    marker: String,
}

impl Default for Merger {
    fn default() -> Self {
        Self::new(DEFAULT_PARAM_MARKER)
    }
}

impl Merger {
    pub fn new(marker: impl Into<String>) -> Self {
        Self {
            marker: marker.into(),
        }
    }

    /// Whether `key` names a parameter eligible for blending.
    pub fn is_param(&self, key: &str) -> bool {
        key.contains(&self.marker)
    }

    /// Phase 1: blend every marked key present in both `out` and `theta_b`.
    ///
    /// Returns the number of blended keys.
    pub fn blend_common(
        &self,
        out: &mut ParamMap,
        theta_b: &ParamMap,
        alpha: f64,
    ) -> Result<usize, MergeError> {
        let mut blended = 0;
        for (key, tensor) in out.iter_mut() {
            if !self.is_param(key) {
                continue;
            }
            let Some(other) = theta_b.get(key) else {
                continue;
            };
            *tensor = tensor.blend(other, alpha, key)?;
            blended += 1;
        }
        debug!(blended, alpha, "blended common weights");
        Ok(blended)
    }

    /// Phase 2: copy marked keys that only `theta_b` has.
    ///
    /// Returns the number of copied keys (zero is fine).
    pub fn copy_distinct(&self, out: &mut ParamMap, theta_b: &ParamMap) -> usize {
        let mut copied = 0;
        for (key, tensor) in theta_b {
            if self.is_param(key) && !out.contains_key(key) {
                out.insert(key.clone(), tensor.clone());
                copied += 1;
            }
        }
        debug!(copied, "copied distinct weights");
        copied
    }

    /// Phase 3: apply the requested precision to every marked float tensor.
    ///
    /// Returns the number of converted keys.
    pub fn convert_precision(&self, out: &mut ParamMap, precision: Precision) -> usize {
        if precision == Precision::Full {
            return 0;
        }
        let mut converted = 0;
        for (key, tensor) in out.iter_mut() {
            if self.is_param(key) && tensor.is_float() {
                *tensor = tensor.to_half();
                converted += 1;
            }
        }
        debug!(converted, "converted weights to fp16");
        converted
    }

    /// Merge `theta_b` into a copy of `theta_a` at weight `alpha`.
    ///
    /// Neither input is modified, so repeated calls over one batch always start
    /// from the same source weights.
    pub fn merge(
        &self,
        theta_a: &ParamMap,
        theta_b: &ParamMap,
        alpha: f64,
        precision: Precision,
    ) -> Result<ParamMap, MergeError> {
        let mut out = theta_a.clone();
        self.blend_common(&mut out, theta_b, alpha)?;
        self.copy_distinct(&mut out, theta_b);
        self.convert_precision(&mut out, precision);
        Ok(out)
    }
}

/// Merge with the default `"model"` marker.
pub fn merge(
    theta_a: &ParamMap,
    theta_b: &ParamMap,
    alpha: f64,
    precision: Precision,
) -> Result<ParamMap, MergeError> {
    Merger::default().merge(theta_a, theta_b, alpha, precision)
}

#[cfg(test)]
mod tests {
    use super::*;
    use safetensors::Dtype;

    fn map(entries: &[(&str, Tensor)]) -> ParamMap {
        entries
            .iter()
            .map(|(k, t)| (k.to_string(), t.clone()))
            .collect()
    }

    fn t(values: &[f32]) -> Tensor {
        Tensor::from_f32(vec![values.len()], values.to_vec())
    }

    fn values<'a>(m: &'a ParamMap, key: &str) -> &'a [f32] {
        m[key].values().unwrap()
    }

    fn assert_close(actual: &[f32], expected: &[f32]) {
        assert_eq!(actual.len(), expected.len());
        for (a, e) in actual.iter().zip(expected) {
            assert!((a - e).abs() < 1e-6, "got {actual:?}, expected {expected:?}");
        }
    }

    #[test]
    fn alpha_zero_and_one_select_the_sources() {
        let a = map(&[("model.w", t(&[1.0, -2.0]))]);
        let b = map(&[("model.w", t(&[3.0, 6.0]))]);

        let at_a = merge(&a, &b, 0.0, Precision::Full).unwrap();
        let at_b = merge(&a, &b, 1.0, Precision::Full).unwrap();
        assert_close(values(&at_a, "model.w"), &[1.0, -2.0]);
        assert_close(values(&at_b, "model.w"), &[3.0, 6.0]);
    }

    #[test]
    fn half_alpha_is_the_mean() {
        let a = map(&[("model.w", t(&[1.0, 2.0, 3.0]))]);
        let b = map(&[("model.w", t(&[4.0, 5.0, 6.0]))]);
        let out = merge(&a, &b, 0.5, Precision::Full).unwrap();
        assert_close(values(&out, "model.w"), &[2.5, 3.5, 4.5]);
    }

    #[test]
    fn union_of_marked_keys_with_distinct_copy() {
        // Exact/Full scenario: shared key blended, B-only key copied verbatim.
        let extra = Tensor::from_f32(vec![2, 1], vec![7.0, 8.0]);
        let a = map(&[("model.weight", t(&[0.0, 10.0]))]);
        let b = map(&[
            ("model.weight", t(&[10.0, 0.0])),
            ("model.extra", extra.clone()),
        ]);

        let out = merge(&a, &b, 0.25, Precision::Full).unwrap();
        assert_eq!(out.len(), 2);
        assert_close(values(&out, "model.weight"), &[2.5, 7.5]);
        assert_eq!(out["model.extra"], extra);
        assert_eq!(out["model.weight"].dtype(), Dtype::F32);
        assert_eq!(out["model.extra"].dtype(), Dtype::F32);
    }

    #[test]
    fn unmarked_keys_pass_through_from_a_only() {
        let a = map(&[
            ("model.w", t(&[0.0])),
            ("optimizer.step", t(&[1.0])),
        ]);
        let b = map(&[
            ("model.w", t(&[1.0])),
            ("optimizer.step", t(&[99.0])),
            ("ema.decay", t(&[0.5])),
        ]);

        let out = merge(&a, &b, 0.5, Precision::Half).unwrap();
        assert_eq!(out["optimizer.step"], a["optimizer.step"]);
        assert_eq!(out["optimizer.step"].dtype(), Dtype::F32);
        assert!(!out.contains_key("ema.decay"));
    }

    #[test]
    fn half_precision_downcasts_every_marked_float_tensor() {
        let ids: Vec<u8> = [0i64, 1].iter().flat_map(|v| v.to_le_bytes()).collect();
        let position_ids =
            Tensor::from_bytes("model.position_ids", Dtype::I64, vec![2], &ids).unwrap();
        let a = map(&[
            ("model.a", t(&[0.1, 0.2])),
            ("model.shared_bf16", Tensor::from_values(Dtype::BF16, vec![1], vec![1.0])),
            ("model.position_ids", position_ids.clone()),
            ("other", t(&[0.3])),
        ]);
        let b = map(&[
            ("model.a", t(&[0.3, 0.4])),
            ("model.shared_bf16", Tensor::from_values(Dtype::BF16, vec![1], vec![3.0])),
            ("model.position_ids", position_ids.clone()),
            ("model.only_b", t(&[0.5])),
        ]);

        let out = merge(&a, &b, 0.5, Precision::Half).unwrap();
        for (key, tensor) in &out {
            if key.contains("model") && tensor.is_float() {
                assert_eq!(tensor.dtype(), Dtype::F16, "{key}");
            }
        }
        assert_eq!(out["model.position_ids"], position_ids);
        assert_eq!(out["model.position_ids"].dtype(), Dtype::I64);
        assert_eq!(out["other"].dtype(), Dtype::F32);
    }

    #[test]
    fn inputs_are_not_mutated() {
        let a = map(&[("model.w", t(&[0.0, 0.0]))]);
        let b = map(&[("model.w", t(&[1.0, 1.0])), ("model.x", t(&[2.0]))]);
        let a_before = a.clone();
        let b_before = b.clone();

        let first = merge(&a, &b, 0.5, Precision::Half).unwrap();
        let second = merge(&a, &b, 0.5, Precision::Half).unwrap();

        assert_eq!(a, a_before);
        assert_eq!(b, b_before);
        assert_eq!(first, second);
    }

    #[test]
    fn shape_mismatch_is_fatal_and_names_the_key() {
        let a = map(&[("model.w", Tensor::from_f32(vec![2], vec![0.0, 0.0]))]);
        let b = map(&[("model.w", Tensor::from_f32(vec![3], vec![0.0; 3]))]);
        let err = merge(&a, &b, 0.5, Precision::Full).unwrap_err();
        assert!(err.to_string().contains("model.w"), "{err}");
    }

    #[test]
    fn phases_report_counts() {
        let merger = Merger::new("model");
        let a = map(&[("model.a", t(&[0.0])), ("model.b", t(&[0.0])), ("x", t(&[0.0]))]);
        let b = map(&[("model.a", t(&[1.0])), ("model.c", t(&[1.0])), ("x", t(&[1.0]))]);

        let mut out = a.clone();
        assert_eq!(merger.blend_common(&mut out, &b, 0.5).unwrap(), 1);
        assert_eq!(merger.copy_distinct(&mut out, &b), 1);
        assert_eq!(merger.copy_distinct(&mut out, &b), 0);
        assert_eq!(merger.convert_precision(&mut out, Precision::Full), 0);
        assert_eq!(merger.convert_precision(&mut out, Precision::Half), 3);
    }

    #[test]
    fn custom_marker_selects_keys() {
        let merger = Merger::new("unet");
        let a = map(&[("unet.w", t(&[0.0])), ("model.w", t(&[0.0]))]);
        let b = map(&[("unet.w", t(&[1.0])), ("model.w", t(&[1.0]))]);
        let out = merger.merge(&a, &b, 1.0, Precision::Full).unwrap();
        assert_close(values(&out, "unet.w"), &[1.0]);
        assert_close(values(&out, "model.w"), &[0.0]);
    }
}
