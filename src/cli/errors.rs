use std::path::PathBuf;
use thiserror::Error;

/// Application-specific errors for the CLI
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Worker count must be greater than 0, got: {workers}")]
    ZeroWorkers { workers: usize },

    #[error("Report path {path:?} is a directory")]
    ReportIsDirectory { path: PathBuf },

    #[error(transparent)]
    Library(#[from] tiletrend::Error),
}
