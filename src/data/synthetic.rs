//! Synthetic checkpoint pairs.
//!
//! `bcm demo` writes two small checkpoints that exercise every merge path:
//!
//! - `model.*` weights shared by both (blended)
//! - `model.extra.*` present only in model B (copied)
//! - `first_stage_stats.*` without the marker (kept from model A)
//! - `model.position_ids` as an identical I64 tensor (passed through)
//!
//! Weights are Gaussian with a seeded RNG, so the same seed always produces
//! byte-identical files.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;
use safetensors::Dtype;

use crate::error::AppError;
use crate::io::checkpoint::{Checkpoint, save_checkpoint};
use crate::merge::{ParamMap, Tensor};

/// Shape and randomness of a synthetic pair.
#[derive(Debug, Clone)]
pub struct SyntheticConfig {
    pub seed: u64,
    pub layers: usize,
    pub width: usize,
    /// Standard deviation of the generated weights.
    pub std_dev: f64,
    /// Store model B in FP16 (model A is always FP32).
    pub half_b: bool,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            layers: 4,
            width: 16,
            std_dev: 0.02,
            half_b: false,
        }
    }
}

/// Generate model A and model B.
pub fn generate_pair(config: &SyntheticConfig) -> Result<(Checkpoint, Checkpoint), AppError> {
    if config.layers == 0 || config.width == 0 {
        return Err(AppError::new(2, "Synthetic models need at least one layer of width >= 1."));
    }
    let normal = Normal::new(0.0, config.std_dev)
        .map_err(|e| AppError::new(2, format!("Invalid weight std-dev {}: {e}", config.std_dev)))?;
    let mut rng = StdRng::seed_from_u64(config.seed);

    let dtype_b = if config.half_b { Dtype::F16 } else { Dtype::F32 };
    let mut a = ParamMap::new();
    let mut b = ParamMap::new();

    for layer in 0..config.layers {
        let w = config.width;
        for (suffix, shape) in [("weight", vec![w, w]), ("bias", vec![w])] {
            let key = format!("model.diffusion_model.layers.{layer}.{suffix}");
            a.insert(key.clone(), random_tensor(&mut rng, normal, Dtype::F32, shape.clone()));
            b.insert(key, random_tensor(&mut rng, normal, dtype_b, shape));
        }
    }

    b.insert(
        "model.extra.weight".to_string(),
        random_tensor(&mut rng, normal, dtype_b, vec![config.width]),
    );

    let stats = random_tensor(&mut rng, normal, Dtype::F32, vec![2]);
    a.insert("first_stage_stats.scale".to_string(), stats.clone());
    b.insert("first_stage_stats.scale".to_string(), stats.to_half());

    let ids: Vec<u8> = (0..config.width as i64).flat_map(|i| i.to_le_bytes()).collect();
    let position_ids = Tensor::from_bytes("model.position_ids", Dtype::I64, vec![config.width], &ids)
        .map_err(AppError::from)?;
    a.insert("model.position_ids".to_string(), position_ids.clone());
    b.insert("model.position_ids".to_string(), position_ids);

    Ok((with_metadata(a, "a", config), with_metadata(b, "b", config)))
}

/// Write the pair as `demo_a.ckpt` and `demo_b.ckpt` into `dir`.
pub fn write_pair(dir: &Path, config: &SyntheticConfig) -> Result<(PathBuf, PathBuf), AppError> {
    std::fs::create_dir_all(dir)
        .map_err(|e| AppError::new(4, format!("Failed to create '{}': {e}", dir.display())))?;
    let (a, b) = generate_pair(config)?;
    let path_a = dir.join("demo_a.ckpt");
    let path_b = dir.join("demo_b.ckpt");
    save_checkpoint(&path_a, &a)?;
    save_checkpoint(&path_b, &b)?;
    Ok((path_a, path_b))
}

fn random_tensor(rng: &mut StdRng, normal: Normal<f64>, dtype: Dtype, shape: Vec<usize>) -> Tensor {
    let n: usize = shape.iter().product();
    let values = (0..n).map(|_| normal.sample(rng) as f32).collect();
    Tensor::from_values(dtype, shape, values)
}

fn with_metadata(tensors: ParamMap, which: &str, config: &SyntheticConfig) -> Checkpoint {
    let mut metadata = BTreeMap::new();
    metadata.insert("bcm.synthetic".to_string(), which.to_string());
    metadata.insert("bcm.seed".to_string(), config.seed.to_string());
    Checkpoint { tensors, metadata }
}
