//! Application-level error.
//!
//! Every failure that reaches `main` is an [`AppError`]: a message for the user
//! plus the process exit code.
//!
//! - `2`: invalid input (bad alpha parameters, missing files, canceled prompts)
//! - `3`: a merge step failed (shape or element-type mismatch)
//! - `4`: I/O, persistence, or terminal failures

use crate::app::pipeline::BatchError;
use crate::merge::MergeError;

#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}

impl From<MergeError> for AppError {
    fn from(err: MergeError) -> Self {
        let exit_code = match err {
            MergeError::ShapeMismatch { .. } | MergeError::UnsupportedDtype { .. } => 3,
            MergeError::InvalidCheckpoint(_) | MergeError::Read { .. } => 2,
            MergeError::Write { .. } | MergeError::Safetensors(_) => 4,
        };
        AppError::new(exit_code, err.to_string())
    }
}

impl From<BatchError> for AppError {
    fn from(err: BatchError) -> Self {
        let inner = AppError::from(err.source);
        let mut message = match err.step {
            Some(step) => format!("Batch aborted at step {step}: {inner}"),
            None => format!("Batch aborted before the first step: {inner}"),
        };
        if !err.completed.is_empty() {
            message.push_str(&format!(
                " ({} checkpoint(s) written before the failure: {})",
                err.completed.len(),
                err.completed.join(", ")
            ));
        }
        AppError::new(inner.exit_code(), message)
    }
}
