//! Crate-level error type and `Result` alias for stable, structured error handling.
//! Converts underlying I/O, GDAL and JSON errors, and provides semantic variants
//! for configuration validation, per-tile failures and mosaic assembly.
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("GDAL error: {0}")]
    Gdal(#[from] crate::io::GdalError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid argument: {arg}={value}")]
    InvalidArgument { arg: &'static str, value: String },

    #[error("Size must be greater than 0, got: {size}")]
    ZeroSize { size: usize },

    #[error("Input not found: {path:?}")]
    InputNotFound { path: PathBuf },

    #[error("Failed to read tile {path:?}: {message}")]
    TileRead { path: PathBuf, message: String },

    #[error("Failed to write tile {path:?}: {message}")]
    TileWrite { path: PathBuf, message: String },

    #[error("Mosaic error: {0}")]
    Mosaic(String),

    #[error("Processing error: {0}")]
    Processing(String),

    #[error("External error: {0}")]
    External(String),
}

/// Coarse classification of a per-tile failure, recorded in batch reports.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Read,
    Write,
    Panic,
    Other,
}

impl Error {
    pub fn external<E: std::fmt::Display>(e: E) -> Self {
        Error::External(e.to_string())
    }

    pub fn tile_read<E: std::fmt::Display>(path: impl Into<PathBuf>, e: E) -> Self {
        Error::TileRead {
            path: path.into(),
            message: e.to_string(),
        }
    }

    pub fn tile_write<E: std::fmt::Display>(path: impl Into<PathBuf>, e: E) -> Self {
        Error::TileWrite {
            path: path.into(),
            message: e.to_string(),
        }
    }

    /// True for errors raised while validating inputs, before any tile is dispatched.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Error::InvalidArgument { .. }
                | Error::ZeroSize { .. }
                | Error::InputNotFound { .. }
        )
    }

    pub fn failure_kind(&self) -> FailureKind {
        match self {
            Error::TileRead { .. } | Error::Gdal(_) => FailureKind::Read,
            Error::TileWrite { .. } | Error::Io(_) => FailureKind::Write,
            _ => FailureKind::Other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_kind_mapping() {
        assert_eq!(
            Error::tile_read("a.tif", "corrupt").failure_kind(),
            FailureKind::Read
        );
        assert_eq!(
            Error::tile_write("b.tif", "disk full").failure_kind(),
            FailureKind::Write
        );
        assert_eq!(
            Error::Processing("x".into()).failure_kind(),
            FailureKind::Other
        );
    }

    #[test]
    fn test_configuration_errors() {
        assert!(Error::ZeroSize { size: 0 }.is_configuration());
        assert!(
            Error::InputNotFound {
                path: PathBuf::from("/missing")
            }
            .is_configuration()
        );
        assert!(!Error::Mosaic("gap".into()).is_configuration());
    }
}
