//! Checkpoint files on disk.
//!
//! A checkpoint is a safetensors container: the tensor table is the state dict
//! and the free-form `__metadata__` map carries everything else. Inputs may use
//! the `.ckpt` or `.safetensors` extension; merged outputs are written as
//! `.ckpt`.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use safetensors::SafeTensors;
use tracing::{debug, info, warn};

use crate::merge::{MergeError, ParamMap, Tensor};

/// File extensions recognized as checkpoints (compared case-insensitively).
pub const CHECKPOINT_EXTENSIONS: [&str; 2] = ["ckpt", "safetensors"];

/// Sub-directory of the source folder that receives merged checkpoints.
pub const BATCH_DIR_NAME: &str = "~batch_merges";

/// A loaded checkpoint: its state dict plus container metadata.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Checkpoint {
    pub tensors: ParamMap,
    pub metadata: BTreeMap<String, String>,
}

/// Load a checkpoint from disk.
pub fn load_checkpoint(path: &Path) -> Result<Checkpoint, MergeError> {
    let data = fs::read(path).map_err(|source| MergeError::Read {
        path: path.display().to_string(),
        source,
    })?;

    let invalid = |e: safetensors::SafeTensorError| {
        MergeError::InvalidCheckpoint(format!("'{}' is not a safetensors checkpoint: {e}", path.display()))
    };
    let (_, header) = SafeTensors::read_metadata(&data).map_err(invalid)?;
    let tensors = SafeTensors::deserialize(&data).map_err(invalid)?;

    let mut out = ParamMap::new();
    for (name, view) in tensors.tensors() {
        let tensor = Tensor::from_bytes(&name, view.dtype(), view.shape().to_vec(), view.data())?;
        out.insert(name, tensor);
    }

    let metadata = header
        .metadata()
        .as_ref()
        .map(|m| m.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
        .unwrap_or_default();

    info!(path = %path.display(), tensors = out.len(), "loaded checkpoint");
    Ok(Checkpoint {
        tensors: out,
        metadata,
    })
}

/// Write a checkpoint to disk, replacing any existing file.
pub fn save_checkpoint(path: &Path, checkpoint: &Checkpoint) -> Result<(), MergeError> {
    let metadata: Option<HashMap<String, String>> = if checkpoint.metadata.is_empty() {
        None
    } else {
        Some(checkpoint.metadata.clone().into_iter().collect())
    };

    let bytes = safetensors::serialize(checkpoint.tensors.iter(), &metadata)?;
    fs::write(path, &bytes).map_err(|source| MergeError::Write {
        path: path.display().to_string(),
        source,
    })?;

    info!(path = %path.display(), bytes = bytes.len(), "saved checkpoint");
    Ok(())
}

/// `{source_dir}/~batch_merges`.
pub fn batch_dir(source_dir: &Path) -> PathBuf {
    source_dir.join(BATCH_DIR_NAME)
}

/// Create the batch output directory if needed and return it.
pub fn ensure_batch_dir(source_dir: &Path) -> Result<PathBuf, MergeError> {
    let dir = batch_dir(source_dir);
    fs::create_dir_all(&dir).map_err(|source| MergeError::Write {
        path: dir.display().to_string(),
        source,
    })?;
    Ok(dir)
}

/// Sorted file names of the checkpoints directly inside `dir`.
pub fn list_checkpoints(dir: &Path) -> Result<Vec<String>, MergeError> {
    let entries = fs::read_dir(dir).map_err(|source| MergeError::Read {
        path: dir.display().to_string(),
        source,
    })?;

    let mut names = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_file() || !is_checkpoint_path(&path) {
            continue;
        }
        match path.file_name().and_then(|n| n.to_str()) {
            Some(name) => names.push(name.to_string()),
            None => warn!(path = %path.display(), "skipping checkpoint with a non UTF-8 name"),
        }
    }
    names.sort();
    debug!(dir = %dir.display(), count = names.len(), "listed checkpoints");
    Ok(names)
}

/// Whether the path has a checkpoint extension.
pub fn is_checkpoint_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| CHECKPOINT_EXTENSIONS.iter().any(|known| ext.eq_ignore_ascii_case(known)))
}

/// File name without its checkpoint extension (`a.ckpt` -> `a`).
///
/// Names without a known extension are returned unchanged.
pub fn checkpoint_stem(name: &str) -> &str {
    for ext in CHECKPOINT_EXTENSIONS {
        let Some(dot) = name.len().checked_sub(ext.len() + 1) else {
            continue;
        };
        if !name.is_char_boundary(dot) {
            continue;
        }
        let (stem, suffix) = name.split_at(dot);
        if suffix.starts_with('.') && suffix[1..].eq_ignore_ascii_case(ext) {
            return stem;
        }
    }
    name
}
