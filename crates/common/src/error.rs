//! Error types for visreg

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using the visreg common Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by shared infrastructure (config, persistence, git)
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error at {path}: {source}")]
    IoAt {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Failed to parse {path}: {reason}")]
    Parse { path: PathBuf, reason: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to persist {path}: {source}")]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to lock {path}: {reason}")]
    Lock { path: PathBuf, reason: String },

    #[error("Git metadata unavailable: {0}")]
    Git(String),
}

impl Error {
    /// Attach a path to an I/O error
    pub fn io_at(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::IoAt {
            path: path.into(),
            source,
        }
    }
}
