//! Application errors.

use inkcalc_core::storage::StorageError;
use inkcalc_core::{ConfigError, RecognitionError, SurfaceError};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("Surface error: {0}")]
    Surface(#[from] SurfaceError),
    #[error("Recognizer setup failed: {0}")]
    Recognizer(#[from] RecognitionError),
    #[error("Failed to read script {path}: {source}")]
    ScriptRead {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid script: {0}")]
    Script(#[from] serde_json::Error),
    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("No surface bound")]
    NoSurface,
}
