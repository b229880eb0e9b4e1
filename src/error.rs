//! Error types for opsgym

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, GymError>;

/// Core error types
#[derive(Error, Debug)]
pub enum GymError {
    #[error("exercise catalog unavailable at {path}: {source}")]
    CatalogIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid exercise definition {path}: {}", reasons.join("; "))]
    DefinitionInvalid { path: PathBuf, reasons: Vec<String> },

    #[error("exercise not found: {0}")]
    ExerciseNotFound(String),

    #[error("provisioning failed: {0}")]
    Provision(String),

    #[error("progress file corrupt at {path}: {reason}")]
    ProgressCorrupt { path: PathBuf, reason: String },

    #[error("no exercise specified and no current exercise set")]
    NoCurrentExercise,

    #[error("hint unavailable: {0}")]
    HintUnreadable(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<crate::runner::RunError> for GymError {
    fn from(err: crate::runner::RunError) -> Self {
        GymError::Provision(err.to_string())
    }
}
