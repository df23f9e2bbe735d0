//! Workflow configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::types::{Framework, DEFAULT_MAX_HISTORY};
use crate::{Error, Result};

/// Default diff engine name
pub const DEFAULT_ENGINE: &str = "pixelmatch";

/// Branch treated as authoritative when nothing else is configured
pub const DEFAULT_BRANCH: &str = "main";

/// Resolved configuration for one invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisregConfig {
    /// Driver whose screenshots are processed
    pub framework: Framework,

    /// Root of accepted reference images
    pub baseline_dir: PathBuf,

    /// Root of per-branch candidate images
    pub compare_dir: PathBuf,

    /// Where report JSON and diff rasters are written
    pub report_dir: PathBuf,

    /// Maximum fraction of differing pixels for a pass (0.0 - 1.0)
    pub diff_threshold: f64,

    /// Per-pixel color sensitivity handed to the diff engine (0.0 - 1.0)
    pub pixel_tolerance: f64,

    /// Overwrite baselines with candidates after comparing
    pub update_baselines: bool,

    /// Diff engine name
    pub engine: String,

    /// Authoritative branch; `master` is always treated as default too
    pub default_branch: String,

    /// Branch to use instead of the one reported by git
    pub branch_override: Option<String>,

    /// Number of commits kept in the review history
    pub max_history: usize,
}

impl Default for VisregConfig {
    fn default() -> Self {
        Self {
            framework: Framework::default(),
            baseline_dir: PathBuf::from(".visual/baseline"),
            compare_dir: PathBuf::from(".visual/compare"),
            report_dir: PathBuf::from(".visual/report"),
            diff_threshold: 0.1,
            pixel_tolerance: 0.1,
            update_baselines: false,
            engine: DEFAULT_ENGINE.to_string(),
            default_branch: DEFAULT_BRANCH.to_string(),
            branch_override: None,
            max_history: DEFAULT_MAX_HISTORY,
        }
    }
}

impl VisregConfig {
    /// Load configuration from a TOML file, falling back to defaults when it
    /// does not exist
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| Error::io_at(path, e))?;
        let config: Self = toml::from_str(&content).map_err(|e| Error::Parse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| Error::InvalidConfig(e.to_string()))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| Error::io_at(parent, e))?;
        }
        std::fs::write(path, content).map_err(|e| Error::io_at(path, e))?;
        Ok(())
    }

    /// Apply `VISREG_*` environment overrides
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(branch) = lookup("VISREG_BRANCH").filter(|b| !b.trim().is_empty()) {
            self.branch_override = Some(branch.trim().to_string());
        }
        if let Some(update) = lookup("VISREG_UPDATE_BASELINES") {
            self.update_baselines = matches!(
                update.trim().to_ascii_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            );
        }
        if let Some(threshold) = lookup("VISREG_DIFF_THRESHOLD") {
            self.diff_threshold = threshold.trim().parse().map_err(|_| {
                Error::InvalidConfig(format!(
                    "VISREG_DIFF_THRESHOLD is not a number: {}",
                    threshold
                ))
            })?;
        }
        self.validate()
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.diff_threshold) {
            return Err(Error::InvalidConfig(format!(
                "diff_threshold must be within [0, 1], got {}",
                self.diff_threshold
            )));
        }
        if !(0.0..=1.0).contains(&self.pixel_tolerance) {
            return Err(Error::InvalidConfig(format!(
                "pixel_tolerance must be within [0, 1], got {}",
                self.pixel_tolerance
            )));
        }
        if self.max_history == 0 {
            return Err(Error::InvalidConfig("max_history must be at least 1".to_string()));
        }
        for (field, dir) in [
            ("baseline_dir", &self.baseline_dir),
            ("compare_dir", &self.compare_dir),
            ("report_dir", &self.report_dir),
        ] {
            if dir.as_os_str().is_empty() {
                return Err(Error::InvalidConfig(format!("{} must not be empty", field)));
            }
        }
        Ok(())
    }

    /// Path of the serialized report
    pub fn report_path(&self) -> PathBuf {
        self.report_dir.join("compare-report.json")
    }

    pub fn history_path(&self) -> PathBuf {
        self.report_dir.join("history.json")
    }

    pub fn approvals_path(&self) -> PathBuf {
        self.report_dir.join("approvals.json")
    }

    /// Root of diff rasters and the CI summary
    pub fn diffs_dir(&self) -> PathBuf {
        self.report_dir.join("diffs")
    }

    pub fn diff_summary_path(&self) -> PathBuf {
        self.diffs_dir().join("diffs.json")
    }

    pub fn lock_path(&self) -> PathBuf {
        self.report_dir.join(".visreg.lock")
    }
}
