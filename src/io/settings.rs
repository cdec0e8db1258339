//! Remembered front-end settings (JSON).
//!
//! Settings belong to the front-ends only: the last folder and the last batch
//! parameters. They are loaded once at start-up and saved after a successful
//! merge or a folder change; the merge engine never reads them.
//!
//! Location, first match wins:
//! - `BCM_SETTINGS` (environment or `.env`)
//! - `$HOME/.bcm/settings.json`
//! - `./.bcm_settings.json`

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::{AlphaParams, Precision};
use crate::error::AppError;

const SETTINGS_ENV: &str = "BCM_SETTINGS";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Folder the checkpoints were last picked from.
    pub folder: Option<PathBuf>,
    pub alpha: AlphaParams,
    pub precision: Precision,
    pub marker: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            folder: None,
            alpha: AlphaParams::default(),
            precision: Precision::Half,
            marker: crate::domain::DEFAULT_PARAM_MARKER.to_string(),
        }
    }
}

impl Settings {
    /// Resolve the settings path from the environment.
    pub fn path_from_env() -> PathBuf {
        dotenvy::dotenv().ok();
        if let Ok(path) = std::env::var(SETTINGS_ENV) {
            if !path.trim().is_empty() {
                return PathBuf::from(path);
            }
        }
        match std::env::var_os("HOME") {
            Some(home) => PathBuf::from(home).join(".bcm").join("settings.json"),
            None => PathBuf::from(".bcm_settings.json"),
        }
    }

    /// Load from the default location.
    pub fn load() -> Result<Self, AppError> {
        Self::load_from(&Self::path_from_env())
    }

    /// Load from `path`; a missing file yields defaults.
    pub fn load_from(path: &Path) -> Result<Self, AppError> {
        if !path.exists() {
            debug!(path = %path.display(), "no settings file, using defaults");
            return Ok(Self::default());
        }
        let file = File::open(path)
            .map_err(|e| AppError::new(4, format!("Failed to open settings '{}': {e}", path.display())))?;
        serde_json::from_reader(file)
            .map_err(|e| AppError::new(2, format!("Invalid settings file '{}': {e}", path.display())))
    }

    /// Save to the default location.
    pub fn save(&self) -> Result<(), AppError> {
        self.save_to(&Self::path_from_env())
    }

    pub fn save_to(&self, path: &Path) -> Result<(), AppError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                AppError::new(4, format!("Failed to create settings dir '{}': {e}", parent.display()))
            })?;
        }
        let file = File::create(path)
            .map_err(|e| AppError::new(4, format!("Failed to create settings '{}': {e}", path.display())))?;
        serde_json::to_writer_pretty(file, self)
            .map_err(|e| AppError::new(4, format!("Failed to write settings: {e}")))?;
        debug!(path = %path.display(), "saved settings");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::InterpolationModel;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load_from(&dir.path().join("none.json")).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.alpha.count, 8);
        assert_eq!(settings.precision, Precision::Half);
    }

    #[test]
    fn save_then_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");
        let settings = Settings {
            folder: Some(PathBuf::from("/models")),
            alpha: AlphaParams {
                start: 0.1,
                step: 0.2,
                count: 4,
                model: InterpolationModel::Exact,
            },
            precision: Precision::Full,
            marker: "unet".to_string(),
        };
        settings.save_to(&path).unwrap();
        assert_eq!(Settings::load_from(&path).unwrap(), settings);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.json");
        fs::write(&path, r#"{"folder": "/x", "alpha": {"count": 3}}"#).unwrap();
        let settings = Settings::load_from(&path).unwrap();
        assert_eq!(settings.folder, Some(PathBuf::from("/x")));
        assert_eq!(settings.alpha.count, 3);
        assert_eq!(settings.alpha.start, 0.05);
        assert_eq!(settings.marker, "model");
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.json");
        fs::write(&path, "{not json").unwrap();
        assert_eq!(Settings::load_from(&path).unwrap_err().exit_code(), 2);
    }
}
