//! Shared domain types.
//!
//! These types are intentionally kept small and serializable so they can be:
//!
//! - parsed from CLI flags (`clap::ValueEnum`)
//! - remembered between runs (`serde`)
//! - rendered in filenames, tables, and the TUI

use std::fmt;
use std::path::PathBuf;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Substring identifying trainable parameters in a state dict.
///
/// Only keys containing the marker are blended, copied from model B, or
/// downcast; every other key keeps model A's value.
pub const DEFAULT_PARAM_MARKER: &str = "model";

/// How raw alpha fractions are reshaped before they are used as merge weights.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum InterpolationModel {
    /// Linear model: effective alpha equals raw alpha.
    Exact,
    /// `3x² − 2x³`.
    #[value(name = "smoothstep")]
    SmoothStep,
    /// `6x⁵ − 15x⁴ + 10x³`.
    #[value(name = "smootherstep")]
    SmootherStep,
    /// `−20x⁷ + 70x⁶ − 84x⁵ + 35x⁴`.
    #[value(name = "smootheststep")]
    SmoothestStep,
}

impl InterpolationModel {
    pub const ALL: [InterpolationModel; 4] = [
        InterpolationModel::SmoothStep,
        InterpolationModel::SmootherStep,
        InterpolationModel::SmoothestStep,
        InterpolationModel::Exact,
    ];

    /// Name used in output filenames and on screen.
    pub fn display_name(self) -> &'static str {
        match self {
            InterpolationModel::Exact => "Exact",
            InterpolationModel::SmoothStep => "SmoothStep",
            InterpolationModel::SmootherStep => "SmootherStep",
            InterpolationModel::SmoothestStep => "SmoothestStep",
        }
    }

    /// Short description shown next to the curve preview.
    pub fn blurb(self) -> &'static str {
        match self {
            InterpolationModel::Exact => {
                "Linear merging model, no interpolation is applied to the step size (1:1)."
            }
            _ => {
                "Sigmoid-like interpolation model. Biases step sizes toward 0 and 1, \
                 where merging has the largest effect."
            }
        }
    }

    pub fn next(self) -> Self {
        let idx = Self::ALL.iter().position(|m| *m == self).unwrap_or(0);
        Self::ALL[(idx + 1) % Self::ALL.len()]
    }

    pub fn prev(self) -> Self {
        let idx = Self::ALL.iter().position(|m| *m == self).unwrap_or(0);
        Self::ALL[(idx + Self::ALL.len() - 1) % Self::ALL.len()]
    }
}

impl fmt::Display for InterpolationModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Floating-point precision of merged parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Precision {
    /// Downcast every merged parameter to FP16.
    Half,
    /// Keep the blended element type (FP32 inputs stay FP32).
    Full,
}

impl Precision {
    pub fn display_name(self) -> &'static str {
        match self {
            Precision::Half => "Half (FP16)",
            Precision::Full => "Full (FP32)",
        }
    }

    pub fn toggle(self) -> Self {
        match self {
            Precision::Half => Precision::Full,
            Precision::Full => Precision::Half,
        }
    }
}

impl fmt::Display for Precision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// One position in a batch: the fraction used for naming and the fraction used
/// as the merge weight.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlphaStep {
    /// Requested fraction, rounded to 2 decimals.
    pub raw: f64,
    /// `raw` reshaped by the interpolation curve (not rounded).
    pub effective: f64,
}

/// Ordered, index-aligned alpha progression for one batch.
#[derive(Debug, Clone, PartialEq)]
pub struct AlphaSequence {
    pub model: InterpolationModel,
    pub steps: Vec<AlphaStep>,
}

impl AlphaSequence {
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, AlphaStep> {
        self.steps.iter()
    }

    pub fn raw(&self) -> Vec<f64> {
        self.steps.iter().map(|s| s.raw).collect()
    }

    pub fn effective(&self) -> Vec<f64> {
        self.steps.iter().map(|s| s.effective).collect()
    }
}

/// Parameters describing the alpha progression of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlphaParams {
    pub start: f64,
    pub step: f64,
    pub count: usize,
    pub model: InterpolationModel,
}

impl Default for AlphaParams {
    fn default() -> Self {
        Self {
            start: 0.05,
            step: 0.05,
            count: 8,
            model: InterpolationModel::SmoothStep,
        }
    }
}

/// A full run's configuration as understood by the pipeline.
///
/// This is derived from CLI flags (plus remembered settings) or from the TUI.
#[derive(Debug, Clone)]
pub struct BatchConfig {
    pub folder: PathBuf,
    pub model_a: String,
    pub model_b: String,
    pub alpha: AlphaParams,
    pub precision: Precision,
    pub marker: String,

    pub plot: bool,
    pub plot_width: usize,
    pub plot_height: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_cycle_visits_every_variant() {
        let mut m = InterpolationModel::SmoothStep;
        let mut seen = Vec::new();
        for _ in 0..InterpolationModel::ALL.len() {
            seen.push(m);
            m = m.next();
        }
        assert_eq!(m, InterpolationModel::SmoothStep);
        for model in InterpolationModel::ALL {
            assert!(seen.contains(&model));
            assert_eq!(model.next().prev(), model);
        }
    }

    #[test]
    fn display_names_match_filename_grammar() {
        assert_eq!(InterpolationModel::Exact.to_string(), "Exact");
        assert_eq!(InterpolationModel::SmoothestStep.to_string(), "SmoothestStep");
        assert_eq!(Precision::Half.to_string(), "Half (FP16)");
    }

    #[test]
    fn settings_enums_roundtrip_through_serde() {
        let json = serde_json::to_string(&InterpolationModel::SmootherStep).unwrap();
        assert_eq!(json, "\"smootherstep\"");
        let back: Precision = serde_json::from_str("\"full\"").unwrap();
        assert_eq!(back, Precision::Full);
    }
}
