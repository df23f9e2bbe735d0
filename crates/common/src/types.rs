//! Core types for visreg
//!
//! Everything in here is persisted as JSON under the report directory, so the
//! serde shapes are part of the on-disk contract read by the review viewer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::str::FromStr;

use crate::git::GitContext;
use crate::naming;

/// Default number of commits retained in the review history
pub const DEFAULT_MAX_HISTORY: usize = 5;

/// Browser/UI automation driver that produced a screenshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Framework {
    Playwright,
    Puppeteer,
    Selenium,
    Cypress,
    Webdriverio,
}

impl Default for Framework {
    fn default() -> Self {
        Self::Playwright
    }
}

impl Framework {
    pub fn as_str(&self) -> &'static str {
        match self {
            Framework::Playwright => "playwright",
            Framework::Puppeteer => "puppeteer",
            Framework::Selenium => "selenium",
            Framework::Cypress => "cypress",
            Framework::Webdriverio => "webdriverio",
        }
    }
}

impl std::fmt::Display for Framework {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Framework {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "playwright" => Ok(Framework::Playwright),
            "puppeteer" => Ok(Framework::Puppeteer),
            "selenium" => Ok(Framework::Selenium),
            "cypress" => Ok(Framework::Cypress),
            "webdriverio" | "wdio" => Ok(Framework::Webdriverio),
            other => Err(crate::Error::InvalidConfig(format!(
                "unknown framework '{}'",
                other
            ))),
        }
    }
}

/// Identity of one named screenshot on one branch
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScreenshotIdentity {
    pub framework: Framework,
    pub name: String,
    pub branch: String,
}

impl ScreenshotIdentity {
    /// Build an identity from a caller-supplied name. The name is sanitized
    /// so it can be used as a file stem.
    pub fn new(framework: Framework, name: impl AsRef<str>, branch: impl Into<String>) -> Self {
        Self {
            framework,
            name: naming::sanitize_name(name.as_ref()),
            branch: branch.into(),
        }
    }

    /// Build an identity whose name is derived from a navigation target
    pub fn from_target(framework: Framework, target: &str, branch: impl Into<String>) -> Self {
        Self {
            framework,
            name: naming::derive_name(target),
            branch: branch.into(),
        }
    }
}

impl std::fmt::Display for ScreenshotIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}@{}", self.framework, self.name, self.branch)
    }
}

/// Pixel dimensions of a raster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn pixel_count(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    /// Viewport label shown in the report, e.g. `1280x720`
    pub fn label(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }
}

/// Outcome of resolving or comparing a single screenshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonResult {
    pub name: String,
    pub baseline_path: PathBuf,
    pub compare_path: PathBuf,
    /// `None` only for a freshly bootstrapped baseline
    pub diff_path: Option<PathBuf>,
    pub passed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diff_percentage: Option<f64>,
    pub threshold: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<Dimensions>,
}

impl ComparisonResult {
    /// Result of a pixel comparison. `passed` is derived from the score.
    pub fn compared(
        name: impl Into<String>,
        baseline_path: PathBuf,
        compare_path: PathBuf,
        diff_path: PathBuf,
        diff_percentage: f64,
        threshold: f64,
        dimensions: Dimensions,
    ) -> Self {
        Self {
            name: name.into(),
            baseline_path,
            compare_path,
            diff_path: Some(diff_path),
            passed: diff_percentage <= threshold,
            diff_percentage: Some(diff_percentage),
            threshold,
            dimensions: Some(dimensions),
        }
    }

    /// Result for a screenshot that became the new baseline; nothing was compared
    pub fn bootstrapped(
        name: impl Into<String>,
        baseline_path: PathBuf,
        compare_path: PathBuf,
        threshold: f64,
        dimensions: Option<Dimensions>,
    ) -> Self {
        Self {
            name: name.into(),
            baseline_path,
            compare_path,
            diff_path: None,
            passed: true,
            diff_percentage: None,
            threshold,
            dimensions,
        }
    }

    pub fn is_bootstrap(&self) -> bool {
        self.diff_path.is_none()
    }
}

/// Disposition of a test in the report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    Passed,
    Changed,
    /// Reserved for engine error paths; never produced by a normal comparison
    Failed,
    New,
    Deleted,
}

impl std::fmt::Display for TestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TestStatus::Passed => write!(f, "passed"),
            TestStatus::Changed => write!(f, "changed"),
            TestStatus::Failed => write!(f, "failed"),
            TestStatus::New => write!(f, "new"),
            TestStatus::Deleted => write!(f, "deleted"),
        }
    }
}

/// Reviewer decision overlaid on a test
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalStatus {
    Approved,
    Rejected,
    Pending,
}

impl std::fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApprovalStatus::Approved => write!(f, "approved"),
            ApprovalStatus::Rejected => write!(f, "rejected"),
            ApprovalStatus::Pending => write!(f, "pending"),
        }
    }
}

/// One row of the review report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResult {
    #[serde(flatten)]
    pub result: ComparisonResult,
    pub status: TestStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub viewport: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approval_status: Option<ApprovalStatus>,
}

impl TestResult {
    pub fn name(&self) -> &str {
        &self.result.name
    }

    pub fn is_decided(&self) -> bool {
        matches!(
            self.approval_status,
            Some(ApprovalStatus::Approved) | Some(ApprovalStatus::Rejected)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportMetadata {
    pub generated_at: DateTime<Utc>,
    pub git_info: GitContext,
    pub total_tests: usize,
    pub changed_tests: usize,
    pub passed_tests: usize,
    pub framework: Framework,
    pub tool_version: String,
}

/// Contents of `compare-report.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportData {
    pub metadata: ReportMetadata,
    pub tests: Vec<TestResult>,
}

impl ReportData {
    pub fn find(&self, name: &str) -> Option<&TestResult> {
        self.tests.iter().find(|t| t.name() == name)
    }

    pub fn find_mut(&mut self, name: &str) -> Option<&mut TestResult> {
        self.tests.iter_mut().find(|t| t.name() == name)
    }

    /// Recompute the metadata counters from `tests`
    pub fn recount(&mut self) {
        self.metadata.total_tests = self.tests.len();
        self.metadata.changed_tests = self
            .tests
            .iter()
            .filter(|t| matches!(t.status, TestStatus::Changed | TestStatus::Failed))
            .count();
        self.metadata.passed_tests = self
            .tests
            .iter()
            .filter(|t| t.status == TestStatus::Passed)
            .count();
    }
}

/// Reviewer action on a test
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecisionAction {
    Accept,
    Reject,
}

impl DecisionAction {
    pub fn approval_status(&self) -> ApprovalStatus {
        match self {
            DecisionAction::Accept => ApprovalStatus::Approved,
            DecisionAction::Reject => ApprovalStatus::Rejected,
        }
    }
}

/// A single accept/reject decision with the time it was made
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub action: DecisionAction,
    pub timestamp: DateTime<Utc>,
}

impl Decision {
    pub fn accept(timestamp: DateTime<Utc>) -> Self {
        Self {
            action: DecisionAction::Accept,
            timestamp,
        }
    }

    pub fn reject(timestamp: DateTime<Utc>) -> Self {
        Self {
            action: DecisionAction::Reject,
            timestamp,
        }
    }
}

/// Decisions keyed by test name. Ordered so serialization is stable.
pub type Decisions = BTreeMap<String, Decision>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistorySummary {
    pub total_tests: usize,
    pub accepted: usize,
    pub rejected: usize,
    pub pending: usize,
}

/// One reviewed commit in the history ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryCommit {
    pub short_sha: String,
    pub full_sha: String,
    pub author: String,
    pub email: String,
    pub date: String,
    pub message: String,
    pub branch: String,
    pub approval_timestamp: Option<DateTime<Utc>>,
    pub approvals: Decisions,
    pub summary: HistorySummary,
}

/// Contents of `history.json`; commits are newest first
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryData {
    #[serde(default = "default_max_history")]
    pub max_history: usize,
    #[serde(default)]
    pub commits: Vec<HistoryCommit>,
}

fn default_max_history() -> usize {
    DEFAULT_MAX_HISTORY
}

impl Default for HistoryData {
    fn default() -> Self {
        Self {
            max_history: DEFAULT_MAX_HISTORY,
            commits: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalsMeta {
    pub author: String,
    pub timestamp: DateTime<Utc>,
    pub commit_sha: String,
}

/// Contents of `approvals.json`: the current run's decision snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalsSnapshot {
    #[serde(default)]
    pub approved: Vec<String>,
    #[serde(default)]
    pub rejected: Vec<String>,
    #[serde(default)]
    pub new: Vec<String>,
    #[serde(default)]
    pub deleted: Vec<String>,
    pub meta: ApprovalsMeta,
}

/// Summary counters in `diffs/diffs.json`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffSummaryCounts {
    pub total_tests: usize,
    pub passed_tests: usize,
    pub changed_tests: usize,
    pub new_tests: usize,
    pub deleted_tests: usize,
    pub has_differences: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffEntry {
    pub name: String,
    pub status: TestStatus,
    pub diff_percentage: Option<f64>,
    pub threshold: f64,
    pub baseline_path: PathBuf,
    pub compare_path: PathBuf,
    pub diff_path: Option<PathBuf>,
}

/// CI-oriented summary written to `diffs/diffs.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffSummary {
    pub summary: DiffSummaryCounts,
    pub tests_with_differences: Vec<DiffEntry>,
    pub git_info: GitContext,
    pub generated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(diff: f64, threshold: f64) -> ComparisonResult {
        ComparisonResult::compared(
            "home",
            PathBuf::from("b/home.png"),
            PathBuf::from("c/home.png"),
            PathBuf::from("d/home.png"),
            diff,
            threshold,
            Dimensions { width: 10, height: 10 },
        )
    }

    #[test]
    fn test_passed_matches_threshold() {
        for (diff, threshold) in [(0.0, 0.0), (0.1, 0.1), (0.25, 0.1), (0.05, 0.1), (1.0, 1.0)] {
            let r = result(diff, threshold);
            assert_eq!(r.passed, diff <= threshold, "diff={} threshold={}", diff, threshold);
        }
    }

    #[test]
    fn test_bootstrap_has_no_diff() {
        let r = ComparisonResult::bootstrapped(
            "home",
            PathBuf::from("b/home.png"),
            PathBuf::from("c/home.png"),
            0.1,
            None,
        );
        assert!(r.is_bootstrap());
        assert!(r.passed);
        assert!(r.diff_percentage.is_none());
    }

    #[test]
    fn test_comparison_result_json_shape() {
        let json = serde_json::to_value(result(0.25, 0.1)).unwrap();
        assert_eq!(json["diffPercentage"], 0.25);
        assert_eq!(json["passed"], false);
        assert_eq!(json["baselinePath"], "b/home.png");

        let boot = ComparisonResult::bootstrapped(
            "home",
            PathBuf::from("b/home.png"),
            PathBuf::from("c/home.png"),
            0.1,
            None,
        );
        let json = serde_json::to_value(boot).unwrap();
        assert!(json["diffPath"].is_null());
        assert!(json.get("diffPercentage").is_none());
    }

    #[test]
    fn test_framework_parse() {
        assert_eq!("Playwright".parse::<Framework>().unwrap(), Framework::Playwright);
        assert_eq!("wdio".parse::<Framework>().unwrap(), Framework::Webdriverio);
        assert!("nightwatch".parse::<Framework>().is_err());
    }

    #[test]
    fn test_history_defaults_when_fields_missing() {
        let history: HistoryData = serde_json::from_str("{}").unwrap();
        assert_eq!(history.max_history, DEFAULT_MAX_HISTORY);
        assert!(history.commits.is_empty());
    }
}
