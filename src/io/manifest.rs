//! Output naming and batch manifests.
//!
//! Merged checkpoints are named
//! `{modelA_stem}_{modelB_stem}_{raw_alpha}_{interp_model}.ckpt`. The manifest is
//! the ordered list `modelA, file_1, ..., file_N, modelB`, ready to paste into an
//! X/Y-plot sweep. Both are built from the same rule so the manifest always
//! matches what a batch writes.

use std::fs;
use std::path::Path;

use crate::domain::InterpolationModel;
use crate::error::AppError;
use crate::io::checkpoint::checkpoint_stem;
use crate::sequence::round2;

/// Extension of merged checkpoints.
pub const OUTPUT_EXTENSION: &str = "ckpt";

/// Separator between manifest entries.
pub const MANIFEST_SEPARATOR: &str = ", ";

/// Render a raw alpha the way it appears in filenames (`0.05`, `0.1`, `1.0`).
pub fn format_alpha(raw_alpha: f64) -> String {
    // `Debug` prints the shortest round-trip form and always keeps a decimal
    // point, e.g. `0.1` and `1.0`.
    format!("{:?}", round2(raw_alpha))
}

/// Deterministic output filename for one batch step.
pub fn output_filename(
    model_a: &str,
    model_b: &str,
    raw_alpha: f64,
    model: InterpolationModel,
) -> String {
    format!(
        "{}_{}_{}_{}.{OUTPUT_EXTENSION}",
        checkpoint_stem(model_a),
        checkpoint_stem(model_b),
        format_alpha(raw_alpha),
        model.display_name()
    )
}

/// `modelA, file_1, ..., file_N, modelB`.
pub fn manifest(
    model_a: &str,
    model_b: &str,
    raw_alphas: &[f64],
    model: InterpolationModel,
) -> String {
    let mut entries = Vec::with_capacity(raw_alphas.len() + 2);
    entries.push(model_a.to_string());
    entries.extend(
        raw_alphas
            .iter()
            .map(|&raw| output_filename(model_a, model_b, raw, model)),
    );
    entries.push(model_b.to_string());
    entries.join(MANIFEST_SEPARATOR)
}

/// Write a manifest to a text file (trailing newline added).
pub fn write_manifest(path: &Path, manifest: &str) -> Result<(), AppError> {
    fs::write(path, format!("{manifest}\n"))
        .map_err(|e| AppError::new(4, format!("Failed to write manifest '{}': {e}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alpha_rendering_matches_python_floats() {
        assert_eq!(format_alpha(0.05), "0.05");
        assert_eq!(format_alpha(0.1), "0.1");
        assert_eq!(format_alpha(0.30000000000000004), "0.3");
        assert_eq!(format_alpha(1.0), "1.0");
        assert_eq!(format_alpha(0.0), "0.0");
        assert_eq!(format_alpha(-0.25), "-0.25");
    }

    #[test]
    fn filename_grammar() {
        let name = output_filename("sd15.ckpt", "anything.ckpt", 0.15, InterpolationModel::SmoothStep);
        assert_eq!(name, "sd15_anything_0.15_SmoothStep.ckpt");

        let name = output_filename("a.safetensors", "b.ckpt", 1.0, InterpolationModel::Exact);
        assert_eq!(name, "a_b_1.0_Exact.ckpt");
    }

    #[test]
    fn filenames_are_stable() {
        let first = output_filename("x.ckpt", "y.ckpt", 0.35, InterpolationModel::SmootherStep);
        let second = output_filename("x.ckpt", "y.ckpt", 0.35, InterpolationModel::SmootherStep);
        assert_eq!(first, second);
    }

    #[test]
    fn manifest_lists_sources_around_outputs() {
        let m = manifest("a.ckpt", "b.ckpt", &[0.05, 0.1], InterpolationModel::Exact);
        assert_eq!(
            m,
            "a.ckpt, a_b_0.05_Exact.ckpt, a_b_0.1_Exact.ckpt, b.ckpt"
        );
    }

    #[test]
    fn manifest_file_is_written() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("xy.txt");
        write_manifest(&path, "a, b").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "a, b\n");
    }
}
