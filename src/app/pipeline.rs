//! Shared batch pipeline used by both CLI and TUI front-ends.
//!
//! Keeping this in one place avoids duplicating the core workflow:
//! load A and B once -> per step: name -> blend -> copy distinct -> precision -> save
//!
//! The CLI and the TUI can then focus on presentation (printing vs widgets).
//! Progress is reported through a callback as [`ProgressEvent`]s whose
//! `Display` form is the human-readable log line.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::info;

use crate::domain::{AlphaSequence, AlphaStep, BatchConfig, InterpolationModel, Precision};
use crate::error::AppError;
use crate::io::checkpoint::{Checkpoint, ensure_batch_dir, load_checkpoint, save_checkpoint};
use crate::io::manifest::output_filename;
use crate::merge::{MergeError, Merger};
use crate::sequence::sequence_from;

/// Everything a batch needs, fully resolved.
#[derive(Debug, Clone)]
pub struct BatchRequest {
    pub source_dir: PathBuf,
    pub model_a: String,
    pub model_b: String,
    pub alphas: AlphaSequence,
    pub precision: Precision,
    pub marker: String,
}

impl BatchRequest {
    /// Resolve the alpha sequence for a run configuration.
    pub fn from_config(config: &BatchConfig) -> Result<Self, AppError> {
        Ok(Self {
            source_dir: config.folder.clone(),
            model_a: config.model_a.clone(),
            model_b: config.model_b.clone(),
            alphas: sequence_from(&config.alpha)?,
            precision: config.precision,
            marker: config.marker.clone(),
        })
    }

    pub fn model(&self) -> InterpolationModel {
        self.alphas.model
    }

    /// Output names in step order, without touching the disk.
    pub fn planned_filenames(&self) -> Vec<String> {
        self.alphas
            .iter()
            .map(|a| output_filename(&self.model_a, &self.model_b, a.raw, self.model()))
            .collect()
    }
}

/// Sub-phases of one batch step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    CommonWeights,
    DistinctWeights,
    Precision(Precision),
    Saving,
}

impl Phase {
    pub fn label(self) -> &'static str {
        match self {
            Phase::CommonWeights => "Merging Common Weights",
            Phase::DistinctWeights => "Merging Distinct Weights",
            Phase::Precision(Precision::Half) => "Converting to FP16",
            Phase::Precision(Precision::Full) => "Keeping Full Precision",
            Phase::Saving => "Saving Model",
        }
    }
}

/// A progress notification. Events arrive in batch order.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    BatchStarted { total: usize },
    StepStarted { step: usize, total: usize, filename: String },
    PhaseStarted { step: usize, total: usize, phase: Phase },
    PhaseDone { step: usize, total: usize, phase: Phase },
    BatchComplete { written: usize },
}

impl fmt::Display for ProgressEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProgressEvent::BatchStarted { total } => {
                write!(
                    f,
                    "================ Starting Merge Batch ({total} steps) ================"
                )
            }
            ProgressEvent::StepStarted { step, total, filename } => {
                write!(f, "({step}/{total}) {filename}")
            }
            ProgressEvent::PhaseStarted { step, total, phase } => {
                write!(f, "({step}/{total}) {}...", phase.label())
            }
            ProgressEvent::PhaseDone { step, total, phase } => {
                write!(f, "({step}/{total}) {}... Done!", phase.label())
            }
            ProgressEvent::BatchComplete { written } => {
                write!(
                    f,
                    "================ Merge Batch Complete ({written} written) ================"
                )
            }
        }
    }
}

/// A batch stopped on a fatal error.
#[derive(Debug, Error)]
#[error("batch failed{}: {source}", .step.map(|s| format!(" at step {s}")).unwrap_or_default())]
pub struct BatchError {
    /// 1-based step that failed; `None` when loading or preparing the output
    /// directory failed.
    pub step: Option<usize>,
    /// Files written before the failure, in order.
    pub completed: Vec<String>,
    pub source: MergeError,
}

/// Run a batch and return the written filenames in step order.
///
/// Both checkpoints are loaded once. Every step blends a fresh copy of model
/// A with model B, so no step sees another step's output. The first fatal
/// error stops the batch.
pub fn run_batch(
    request: &BatchRequest,
    on_progress: &mut dyn FnMut(&ProgressEvent),
) -> Result<Vec<String>, BatchError> {
    let before_first = |source| BatchError {
        step: None,
        completed: Vec::new(),
        source,
    };

    let total = request.alphas.len();
    on_progress(&ProgressEvent::BatchStarted { total });

    let model_a =
        load_checkpoint(&request.source_dir.join(&request.model_a)).map_err(before_first)?;
    let model_b =
        load_checkpoint(&request.source_dir.join(&request.model_b)).map_err(before_first)?;
    let out_dir = ensure_batch_dir(&request.source_dir).map_err(before_first)?;

    let merger = Merger::new(request.marker.as_str());
    let mut written = Vec::with_capacity(total);

    for (idx, alpha) in request.alphas.iter().enumerate() {
        let step = idx + 1;
        let filename =
            output_filename(&request.model_a, &request.model_b, alpha.raw, request.model());
        on_progress(&ProgressEvent::StepStarted {
            step,
            total,
            filename: filename.clone(),
        });

        let ctx = StepContext {
            merger: &merger,
            request,
            step,
            total,
        };
        let path = out_dir.join(&filename);
        if let Err(source) = ctx.run(&model_a, &model_b, alpha, &path, on_progress) {
            return Err(BatchError {
                step: Some(step),
                completed: written,
                source,
            });
        }

        info!(step, total, file = %filename, alpha = alpha.effective, "merged step");
        written.push(filename);
    }

    on_progress(&ProgressEvent::BatchComplete {
        written: written.len(),
    });
    Ok(written)
}

struct StepContext<'a> {
    merger: &'a Merger,
    request: &'a BatchRequest,
    step: usize,
    total: usize,
}

impl StepContext<'_> {
    fn run(
        &self,
        model_a: &Checkpoint,
        model_b: &Checkpoint,
        alpha: &AlphaStep,
        path: &Path,
        on_progress: &mut dyn FnMut(&ProgressEvent),
    ) -> Result<(), MergeError> {
        let mut out = Checkpoint {
            tensors: model_a.tensors.clone(),
            metadata: self.provenance(&model_a.metadata, alpha),
        };

        self.phase(on_progress, Phase::CommonWeights, || {
            self.merger
                .blend_common(&mut out.tensors, &model_b.tensors, alpha.effective)
        })?;
        self.phase(on_progress, Phase::DistinctWeights, || {
            Ok(self.merger.copy_distinct(&mut out.tensors, &model_b.tensors))
        })?;
        self.phase(on_progress, Phase::Precision(self.request.precision), || {
            Ok(self
                .merger
                .convert_precision(&mut out.tensors, self.request.precision))
        })?;
        self.phase(on_progress, Phase::Saving, || save_checkpoint(path, &out))?;
        Ok(())
    }

    fn phase<T>(
        &self,
        on_progress: &mut dyn FnMut(&ProgressEvent),
        phase: Phase,
        work: impl FnOnce() -> Result<T, MergeError>,
    ) -> Result<T, MergeError> {
        let (step, total) = (self.step, self.total);
        on_progress(&ProgressEvent::PhaseStarted { step, total, phase });
        let out = work()?;
        on_progress(&ProgressEvent::PhaseDone { step, total, phase });
        Ok(out)
    }

    /// Model A's metadata plus where this file came from.
    fn provenance(
        &self,
        base: &BTreeMap<String, String>,
        alpha: &AlphaStep,
    ) -> BTreeMap<String, String> {
        let r = self.request;
        let mut metadata = base.clone();
        metadata.insert("bcm.model_a".to_string(), r.model_a.clone());
        metadata.insert("bcm.model_b".to_string(), r.model_b.clone());
        metadata.insert("bcm.alpha_raw".to_string(), alpha.raw.to_string());
        metadata.insert("bcm.alpha".to_string(), alpha.effective.to_string());
        metadata.insert("bcm.interp".to_string(), r.model().display_name().to_string());
        metadata.insert("bcm.precision".to_string(), r.precision.display_name().to_string());
        metadata.insert("bcm.marker".to_string(), r.marker.clone());
        metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{SyntheticConfig, write_pair};
    use crate::domain::DEFAULT_PARAM_MARKER;
    use crate::io::checkpoint::{BATCH_DIR_NAME, batch_dir};
    use crate::io::manifest::manifest;
    use crate::merge::{ParamMap, Tensor, merge};
    use crate::sequence::sequence;
    use safetensors::Dtype;

    fn request(dir: &Path, alphas: AlphaSequence, precision: Precision) -> BatchRequest {
        BatchRequest {
            source_dir: dir.to_path_buf(),
            model_a: "demo_a.ckpt".to_string(),
            model_b: "demo_b.ckpt".to_string(),
            alphas,
            precision,
            marker: DEFAULT_PARAM_MARKER.to_string(),
        }
    }

    fn small_pair(dir: &Path) {
        let config = SyntheticConfig {
            layers: 2,
            width: 4,
            ..SyntheticConfig::default()
        };
        write_pair(dir, &config).unwrap();
    }

    fn write_inputs(dir: &Path, a: ParamMap, b: ParamMap) {
        for (name, tensors) in [("demo_a.ckpt", a), ("demo_b.ckpt", b)] {
            let checkpoint = Checkpoint {
                tensors,
                ..Default::default()
            };
            save_checkpoint(&dir.join(name), &checkpoint).unwrap();
        }
    }

    fn collect(request: &BatchRequest) -> (Result<Vec<String>, BatchError>, Vec<ProgressEvent>) {
        let mut events = Vec::new();
        let result = run_batch(request, &mut |e: &ProgressEvent| events.push(e.clone()));
        (result, events)
    }

    #[test]
    fn batch_writes_manifest_filenames() {
        let dir = tempfile::tempdir().unwrap();
        small_pair(dir.path());
        let alphas = sequence(0.05, 0.05, 8, InterpolationModel::SmoothStep).unwrap();
        let req = request(dir.path(), alphas.clone(), Precision::Half);

        let (result, _) = collect(&req);
        let written = result.unwrap();

        let listed = manifest(&req.model_a, &req.model_b, &alphas.raw(), alphas.model);
        let entries: Vec<String> = listed.split(", ").map(str::to_string).collect();
        assert_eq!(written.len(), 8);
        assert_eq!(entries.len(), 10);
        assert_eq!(entries[1..9].to_vec(), written);
        assert_eq!(written, req.planned_filenames());
        assert_eq!(written[0], "demo_a_demo_b_0.05_SmoothStep.ckpt");

        for name in &written {
            assert!(batch_dir(dir.path()).join(name).is_file(), "{name} missing");
        }
    }

    #[test]
    fn every_step_blends_pristine_inputs() {
        let dir = tempfile::tempdir().unwrap();
        small_pair(dir.path());
        let alphas = sequence(0.2, 0.3, 3, InterpolationModel::SmootherStep).unwrap();
        let req = request(dir.path(), alphas.clone(), Precision::Half);
        let written = collect(&req).0.unwrap();

        let a = load_checkpoint(&dir.path().join("demo_a.ckpt")).unwrap();
        let b = load_checkpoint(&dir.path().join("demo_b.ckpt")).unwrap();

        for (name, step) in written.iter().zip(alphas.iter()) {
            let saved = load_checkpoint(&batch_dir(dir.path()).join(name)).unwrap();
            let expected = merge(&a.tensors, &b.tensors, step.effective, Precision::Half).unwrap();
            assert_eq!(saved.tensors, expected, "{name}");
            assert_eq!(saved.metadata["bcm.alpha_raw"], step.raw.to_string());
            assert_eq!(saved.metadata["bcm.interp"], "SmootherStep");
        }
    }

    #[test]
    fn exact_full_keeps_dtype_and_copies_distinct() {
        let dir = tempfile::tempdir().unwrap();
        let mut a = ParamMap::new();
        a.insert("model.weight".to_string(), Tensor::from_f32(vec![2], vec![0.0, 4.0]));
        let mut b = ParamMap::new();
        b.insert("model.weight".to_string(), Tensor::from_f32(vec![2], vec![4.0, 0.0]));
        let extra = Tensor::from_f32(vec![1], vec![9.0]);
        b.insert("model.extra".to_string(), extra.clone());
        write_inputs(dir.path(), a, b);

        let alphas = sequence(0.25, 0.25, 1, InterpolationModel::Exact).unwrap();
        let req = request(dir.path(), alphas, Precision::Full);
        let written = collect(&req).0.unwrap();
        assert_eq!(written, vec!["demo_a_demo_b_0.25_Exact.ckpt".to_string()]);

        let out = load_checkpoint(&batch_dir(dir.path()).join(&written[0])).unwrap();
        assert_eq!(out.tensors.len(), 2);
        assert_eq!(out.tensors["model.weight"].values().unwrap(), &[1.0, 3.0]);
        assert_eq!(out.tensors["model.weight"].dtype(), Dtype::F32);
        assert_eq!(out.tensors["model.extra"], extra);
    }

    #[test]
    fn progress_brackets_every_phase() {
        let dir = tempfile::tempdir().unwrap();
        small_pair(dir.path());
        let alphas = sequence(0.5, 0.1, 2, InterpolationModel::Exact).unwrap();
        let (result, events) = collect(&request(dir.path(), alphas, Precision::Full));
        result.unwrap();

        // start + 2 * (header + 4 phases * 2) + complete
        assert_eq!(events.len(), 1 + 2 * 9 + 1);
        assert_eq!(events[0], ProgressEvent::BatchStarted { total: 2 });
        assert_eq!(events[1].to_string(), "(1/2) demo_a_demo_b_0.5_Exact.ckpt");
        assert_eq!(events[2].to_string(), "(1/2) Merging Common Weights...");
        assert_eq!(events[3].to_string(), "(1/2) Merging Common Weights... Done!");
        assert_eq!(events[6].to_string(), "(1/2) Keeping Full Precision...");
        assert_eq!(events[10].to_string(), "(2/2) demo_a_demo_b_0.6_Exact.ckpt");
        assert_eq!(events[19], ProgressEvent::BatchComplete { written: 2 });
    }

    #[test]
    fn shape_mismatch_aborts_with_key() {
        let dir = tempfile::tempdir().unwrap();
        let mut a = ParamMap::new();
        a.insert("model.w".to_string(), Tensor::from_f32(vec![2], vec![0.0, 0.0]));
        let mut b = ParamMap::new();
        b.insert("model.w".to_string(), Tensor::from_f32(vec![3], vec![0.0; 3]));
        write_inputs(dir.path(), a, b);

        let alphas = sequence(0.1, 0.1, 3, InterpolationModel::Exact).unwrap();
        let (result, events) = collect(&request(dir.path(), alphas, Precision::Full));
        let err = result.unwrap_err();
        assert_eq!(err.step, Some(1));
        assert!(err.completed.is_empty());
        assert!(matches!(err.source, MergeError::ShapeMismatch { ref key, .. } if key == "model.w"));
        assert!(!events.iter().any(|e| matches!(e, ProgressEvent::BatchComplete { .. })));

        let app_err = AppError::from(err);
        assert_eq!(app_err.exit_code(), 3);
        assert!(app_err.to_string().contains("model.w"));
    }

    #[test]
    fn missing_input_fails_before_first_step() {
        let dir = tempfile::tempdir().unwrap();
        let alphas = sequence(0.1, 0.1, 2, InterpolationModel::Exact).unwrap();
        let err = collect(&request(dir.path(), alphas, Precision::Full)).0.unwrap_err();
        assert_eq!(err.step, None);
        assert!(matches!(err.source, MergeError::Read { .. }));
    }

    #[test]
    fn unwritable_output_dir_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        small_pair(dir.path());
        // A plain file where the output directory should go.
        std::fs::write(dir.path().join(BATCH_DIR_NAME), b"").unwrap();

        let alphas = sequence(0.1, 0.1, 2, InterpolationModel::Exact).unwrap();
        let err = collect(&request(dir.path(), alphas, Precision::Full)).0.unwrap_err();
        assert!(matches!(err.source, MergeError::Write { .. }));
        assert_eq!(AppError::from(err).exit_code(), 4);
    }

    #[test]
    fn failure_after_a_saved_step_reports_completed_files() {
        let dir = tempfile::tempdir().unwrap();
        small_pair(dir.path());
        let alphas = sequence(0.1, 0.1, 3, InterpolationModel::Exact).unwrap();
        let req = request(dir.path(), alphas, Precision::Full);
        let planned = req.planned_filenames();
        // A directory squatting on the second output name makes that save fail.
        std::fs::create_dir_all(batch_dir(dir.path()).join(&planned[1])).unwrap();

        let (result, events) = collect(&req);
        let err = result.unwrap_err();
        assert_eq!(err.step, Some(2));
        assert_eq!(err.completed, vec![planned[0].clone()]);
        assert!(matches!(err.source, MergeError::Write { .. }));
        assert!(batch_dir(dir.path()).join(&planned[0]).is_file());
        assert!(!batch_dir(dir.path()).join(&planned[2]).exists());
        assert!(!events.iter().any(|e| matches!(e, ProgressEvent::BatchComplete { .. })));

        let app_err = AppError::from(err);
        assert_eq!(app_err.exit_code(), 4);
        let message = app_err.to_string();
        assert!(message.starts_with("Batch aborted at step 2"), "{message}");
        assert!(
            message.contains("1 checkpoint(s) written before the failure"),
            "{message}"
        );
        assert!(message.contains(&planned[0]), "{message}");
    }
}
