//! Visreg Common Library
//!
//! Shared data model, configuration, git metadata and persistence helpers
//! for the visual regression workflow.

pub mod config;
pub mod error;
pub mod git;
pub mod naming;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use config::VisregConfig;
pub use error::{Error, Result};
pub use git::{GitCli, GitContext, GitInfoSource, StaticGitInfo};
pub use store::{read_json, write_json_atomic, ReportLock};
pub use types::*;

/// Visreg version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
