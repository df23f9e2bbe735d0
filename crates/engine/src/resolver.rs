//! Baseline-vs-compare mode resolution
//!
//! Decides whether a capture establishes a baseline or is a candidate to be
//! compared, and computes where each artifact lives:
//!
//! ```text
//! {baseline_dir}/{framework}/{name}.png
//! {compare_dir}/{sanitized branch}/{framework}/{name}.png
//! {report_dir}/diffs/{framework}/{name}.png
//! ```
//!
//! Resolution never fails. When the baseline lookup itself errors the
//! screenshot is treated as a new baseline.

use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use visreg_common::naming::sanitize_branch;
use visreg_common::{Framework, ScreenshotIdentity, VisregConfig};

/// Branch that is always authoritative in addition to the configured default
const LEGACY_DEFAULT_BRANCH: &str = "master";

/// File in a branch's candidate directory listing screenshots whose first
/// capture on that branch became the baseline
pub const BOOTSTRAP_MARKER: &str = "bootstrapped.json";

/// Outcome of [`PathResolver::resolve`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// Write the capture as the baseline instead of comparing
    pub should_use_baseline: bool,
    pub baseline_path: PathBuf,
    pub compare_path: PathBuf,
    pub diff_path: PathBuf,
    pub is_default_branch: bool,
}

/// Maps screenshot identities to storage locations
#[derive(Debug, Clone)]
pub struct PathResolver {
    baseline_dir: PathBuf,
    compare_dir: PathBuf,
    diff_dir: PathBuf,
    default_branch: String,
}

impl PathResolver {
    pub fn new(
        baseline_dir: impl Into<PathBuf>,
        compare_dir: impl Into<PathBuf>,
        diff_dir: impl Into<PathBuf>,
        default_branch: impl Into<String>,
    ) -> Self {
        Self {
            baseline_dir: baseline_dir.into(),
            compare_dir: compare_dir.into(),
            diff_dir: diff_dir.into(),
            default_branch: default_branch.into(),
        }
    }

    pub fn from_config(config: &VisregConfig) -> Self {
        Self::new(
            &config.baseline_dir,
            &config.compare_dir,
            config.diffs_dir(),
            &config.default_branch,
        )
    }

    pub fn is_default_branch(&self, branch: &str) -> bool {
        branch == self.default_branch || branch == LEGACY_DEFAULT_BRANCH
    }

    pub fn baseline_path(&self, framework: Framework, name: &str) -> PathBuf {
        self.baseline_dir
            .join(framework.as_str())
            .join(format!("{}.png", name))
    }

    pub fn compare_path(&self, framework: Framework, name: &str, branch: &str) -> PathBuf {
        self.compare_dir
            .join(sanitize_branch(branch))
            .join(framework.as_str())
            .join(format!("{}.png", name))
    }

    pub fn diff_path(&self, framework: Framework, name: &str) -> PathBuf {
        self.diff_dir
            .join(framework.as_str())
            .join(format!("{}.png", name))
    }

    /// Directory holding every baseline for `framework`
    pub fn baseline_framework_dir(&self, framework: Framework) -> PathBuf {
        self.baseline_dir.join(framework.as_str())
    }

    /// Directory holding every candidate for `framework` on `branch`
    pub fn compare_framework_dir(&self, framework: Framework, branch: &str) -> PathBuf {
        self.compare_dir
            .join(sanitize_branch(branch))
            .join(framework.as_str())
    }

    /// Bootstrap marker for `framework` on `branch`
    pub fn bootstrap_marker_path(&self, framework: Framework, branch: &str) -> PathBuf {
        self.compare_framework_dir(framework, branch).join(BOOTSTRAP_MARKER)
    }

    pub fn resolve(&self, identity: &ScreenshotIdentity) -> Resolution {
        let baseline_path = self.baseline_path(identity.framework, &identity.name);
        let compare_path =
            self.compare_path(identity.framework, &identity.name, &identity.branch);
        let diff_path = self.diff_path(identity.framework, &identity.name);
        let is_default_branch = self.is_default_branch(&identity.branch);

        let should_use_baseline = if is_default_branch {
            true
        } else {
            !baseline_exists(&baseline_path)
        };

        debug!(
            framework = %identity.framework,
            name = %identity.name,
            branch = %identity.branch,
            should_use_baseline,
            "Resolved screenshot mode"
        );

        Resolution {
            should_use_baseline,
            baseline_path,
            compare_path,
            diff_path,
            is_default_branch,
        }
    }
}

/// Existence check that fails open: an unreadable location counts as missing
fn baseline_exists(path: &Path) -> bool {
    match path.try_exists() {
        Ok(exists) => exists,
        Err(e) => {
            warn!(
                "Could not check baseline {}: {}; treating as new baseline",
                path.display(),
                e
            );
            false
        }
    }
}
