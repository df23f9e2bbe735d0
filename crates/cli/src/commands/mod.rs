//! CLI Commands

pub mod capture;
pub mod compare;
pub mod decide;
pub mod export;
pub mod history;
pub mod init;
pub mod resolve;
pub mod status;

use anyhow::{Context as _, Result};
use std::path::PathBuf;
use tracing::debug;

use visreg_common::{Framework, GitCli, VisregConfig};
use visreg_engine::Workflow;

use crate::output::OutputFormat;

/// Global flags shared by every command
pub struct Context {
    pub config_path: PathBuf,
    pub repo: PathBuf,
    pub branch: Option<String>,
    pub framework: Option<Framework>,
    pub format: OutputFormat,
}

impl Context {
    /// Configuration from file, then environment, then flags
    pub fn config(&self) -> Result<VisregConfig> {
        let mut config = VisregConfig::load(&self.config_path)
            .with_context(|| format!("Failed to load {}", self.config_path.display()))?;
        config
            .apply_env()
            .context("Invalid VISREG_* environment override")?;

        if let Some(branch) = &self.branch {
            config.branch_override = Some(branch.clone());
        }
        if let Some(framework) = self.framework {
            config.framework = framework;
        }

        debug!("Resolved configuration: {:?}", config);
        Ok(config)
    }

    pub fn workflow(&self) -> Result<Workflow> {
        let config = self.config()?;
        Workflow::from_source(config, &GitCli::new(&self.repo))
            .context("Failed to initialize workflow")
    }
}
