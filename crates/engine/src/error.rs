//! Error types for the visual regression workflow

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum VisregError {
    #[error("Baseline not found: {}", path.display())]
    BaselineMissing { path: PathBuf },

    #[error("Candidate screenshot not found: {}", path.display())]
    CandidateMissing { path: PathBuf },

    #[error(
        "Screenshot dimensions differ: baseline {}x{} vs candidate {}x{}",
        baseline.0, baseline.1, candidate.0, candidate.1
    )]
    IncompatibleDimensions {
        baseline: (u32, u32),
        candidate: (u32, u32),
    },

    #[error("Diff engine '{0}' is not available")]
    EngineUnavailable(String),

    #[error("History file {} is corrupt: {reason}", path.display())]
    HistoryCorrupt { path: PathBuf, reason: String },

    #[error("No report at {}; run a comparison first", path.display())]
    ReportMissing { path: PathBuf },

    #[error("Git metadata unavailable: {0}")]
    GitContextUnavailable(String),

    #[error("Capture failed for '{name}': {reason}")]
    Capture { name: String, reason: String },

    #[error("Failed to decode {}: {source}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("IO error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Common(#[from] visreg_common::Error),
}

impl VisregError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        VisregError::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether the failure is scoped to a single screenshot and the batch
    /// should continue
    pub fn is_per_screenshot(&self) -> bool {
        matches!(
            self,
            VisregError::BaselineMissing { .. }
                | VisregError::CandidateMissing { .. }
                | VisregError::IncompatibleDimensions { .. }
                | VisregError::Decode { .. }
                | VisregError::Capture { .. }
        )
    }
}

pub type VisregResult<T> = Result<T, VisregError>;
