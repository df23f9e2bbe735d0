//! Batch workflow that orchestrates resolution, capture, comparison,
//! aggregation and review history

use chrono::Utc;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};
use walkdir::WalkDir;

use visreg_common::store::{read_json, write_atomic, write_json_atomic, ReportLock};
use visreg_common::{
    ApprovalsSnapshot, ComparisonResult, DecisionAction, Decisions, DiffSummary, Dimensions,
    GitContext, GitInfoSource, HistoryCommit, HistoryData, ReportData, ScreenshotIdentity,
    TestStatus, VisregConfig,
};

use crate::approvals;
use crate::capture::{CaptureOptions, ScreenshotDriver};
use crate::compare::{Comparator, EngineRegistry};
use crate::error::{VisregError, VisregResult};
use crate::history::HistoryStore;
use crate::report;
use crate::resolver::{PathResolver, Resolution};

/// What a capture did with the screenshot bytes
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureOutcome {
    /// Written as the baseline; nothing was compared
    Baseline { result: ComparisonResult },
    /// Written as a candidate for later comparison
    Candidate { path: PathBuf, baseline_path: PathBuf },
}

/// Outcome of [`Workflow::compare_all`]
#[derive(Debug, Clone)]
pub struct BatchReport {
    pub report: ReportData,
    pub summary: DiffSummary,
    /// Screenshots excluded from the report, with the reason
    pub skipped: Vec<(String, String)>,
}

/// Outcome of [`Workflow::decide`]
#[derive(Debug, Clone)]
pub struct DecisionOutcome {
    pub report: ReportData,
    pub approvals: ApprovalsSnapshot,
    pub commit: HistoryCommit,
    /// Decided names that are not in the report
    pub unknown: Vec<String>,
    /// Baselines overwritten or removed by accepted decisions
    pub updated_baselines: Vec<PathBuf>,
}

/// One configured invocation of the visual regression workflow
pub struct Workflow {
    config: VisregConfig,
    git: GitContext,
    resolver: PathResolver,
    comparator: Comparator,
    history: HistoryStore,
}

impl Workflow {
    /// Create a workflow with the built-in diff engines
    pub fn new(config: VisregConfig, git: GitContext) -> VisregResult<Self> {
        Self::with_registry(config, git, EngineRegistry::with_builtin())
    }

    /// Create a workflow, reading git metadata from `source`. Metadata
    /// failures fall back to the `unknown` sentinel.
    pub fn from_source(config: VisregConfig, source: &dyn GitInfoSource) -> VisregResult<Self> {
        let git = match source.fetch() {
            Ok(git) => git,
            Err(e) => {
                let e = VisregError::GitContextUnavailable(e.to_string());
                warn!("{}; using sentinel values", e);
                GitContext::unknown()
            }
        };
        Self::new(config, git)
    }

    pub fn with_registry(
        config: VisregConfig,
        git: GitContext,
        registry: EngineRegistry,
    ) -> VisregResult<Self> {
        config.validate()?;

        let git = match &config.branch_override {
            Some(branch) => git.with_branch(branch.clone()),
            None => git,
        };

        Ok(Self {
            resolver: PathResolver::from_config(&config),
            comparator: Comparator::new(registry, config.pixel_tolerance),
            history: HistoryStore::from_config(&config),
            config,
            git,
        })
    }

    pub fn config(&self) -> &VisregConfig {
        &self.config
    }

    pub fn git(&self) -> &GitContext {
        &self.git
    }

    pub fn resolver(&self) -> &PathResolver {
        &self.resolver
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    /// Identity for `name` in the configured framework on the current branch
    pub fn identity(&self, name: &str) -> ScreenshotIdentity {
        ScreenshotIdentity::new(self.config.framework, name, self.git.branch.clone())
    }

    /// Identity whose name is derived from a navigation target
    pub fn identity_for_target(&self, target: &str) -> ScreenshotIdentity {
        ScreenshotIdentity::from_target(self.config.framework, target, self.git.branch.clone())
    }

    pub fn resolve(&self, identity: &ScreenshotIdentity) -> Resolution {
        self.resolver.resolve(identity)
    }

    /// Capture through `driver` and store the bytes as baseline or candidate
    pub async fn capture(
        &self,
        identity: &ScreenshotIdentity,
        driver: &dyn ScreenshotDriver,
        options: &CaptureOptions,
    ) -> VisregResult<CaptureOutcome> {
        let bytes = driver.capture(identity, options).await?;
        self.store_capture(identity, &bytes)
    }

    /// Store already captured PNG bytes according to the resolved mode
    pub fn store_capture(
        &self,
        identity: &ScreenshotIdentity,
        bytes: &[u8],
    ) -> VisregResult<CaptureOutcome> {
        let resolution = self.resolver.resolve(identity);

        let raster = image::load_from_memory(bytes).map_err(|e| VisregError::Capture {
            name: identity.name.clone(),
            reason: format!("not a decodable image: {}", e),
        })?;
        let dimensions = Dimensions {
            width: raster.width(),
            height: raster.height(),
        };

        if resolution.should_use_baseline {
            write_atomic(&resolution.baseline_path, bytes)?;
            if !resolution.is_default_branch {
                // Keep a candidate so the screenshot is reported as new on
                // this branch rather than as a baseline without a candidate
                write_atomic(&resolution.compare_path, bytes)?;
                self.set_bootstrapped(&identity.name, true)?;
            }
            info!(
                framework = %identity.framework,
                name = %identity.name,
                branch = %identity.branch,
                "Stored baseline {}",
                resolution.baseline_path.display()
            );
            return Ok(CaptureOutcome::Baseline {
                result: ComparisonResult::bootstrapped(
                    identity.name.clone(),
                    resolution.baseline_path,
                    resolution.compare_path,
                    self.config.diff_threshold,
                    Some(dimensions),
                ),
            });
        }

        write_atomic(&resolution.compare_path, bytes)?;
        self.set_bootstrapped(&identity.name, false)?;
        info!(
            framework = %identity.framework,
            name = %identity.name,
            branch = %identity.branch,
            "Stored candidate {}",
            resolution.compare_path.display()
        );
        Ok(CaptureOutcome::Candidate {
            path: resolution.compare_path,
            baseline_path: resolution.baseline_path,
        })
    }

    /// Compare one screenshot against its baseline with the configured
    /// engine and threshold
    pub fn compare_one(&self, identity: &ScreenshotIdentity) -> VisregResult<ComparisonResult> {
        let resolution = self.resolver.resolve(identity);
        self.comparator.compare(
            &resolution.baseline_path,
            &resolution.compare_path,
            &resolution.diff_path,
            self.config.diff_threshold,
            &self.config.engine,
        )
    }

    /// Names of candidates stored for the current branch
    pub fn candidate_names(&self) -> VisregResult<Vec<String>> {
        let dir = self
            .resolver
            .compare_framework_dir(self.config.framework, &self.git.branch);
        png_stems(&dir)
    }

    /// Names of baselines stored for the configured framework
    pub fn baseline_names(&self) -> VisregResult<Vec<String>> {
        png_stems(&self.resolver.baseline_framework_dir(self.config.framework))
    }

    /// Compare every candidate on the current branch, then write
    /// `compare-report.json`, `approvals.json` and `diffs/diffs.json`.
    ///
    /// Per-screenshot failures are logged and left out of the report; a
    /// missing baseline bootstraps one from the candidate. Anything else is
    /// fatal.
    pub fn compare_all(&self) -> VisregResult<BatchReport> {
        let _lock = ReportLock::acquire(&self.config.lock_path())?;

        let names = self.candidate_names()?;
        info!(
            "Comparing {} candidate(s) for {} on '{}'",
            names.len(),
            self.config.framework,
            self.git.branch
        );

        let bootstrapped = self.bootstrapped_names()?;
        let mut results = Vec::with_capacity(names.len());
        let mut skipped = Vec::new();

        for name in &names {
            let identity = self.identity(name);
            if bootstrapped.contains(name) {
                let resolution = self.resolver.resolve(&identity);
                let dimensions = image::image_dimensions(&resolution.compare_path)
                    .ok()
                    .map(|(width, height)| Dimensions { width, height });
                results.push(ComparisonResult::bootstrapped(
                    identity.name.clone(),
                    resolution.baseline_path,
                    resolution.compare_path,
                    self.config.diff_threshold,
                    dimensions,
                ));
                continue;
            }

            match self.compare_one(&identity) {
                Ok(result) => {
                    if self.config.update_baselines {
                        self.update_baseline(&identity)?;
                    }
                    results.push(result);
                }
                Err(VisregError::BaselineMissing { path }) => {
                    info!(
                        framework = %identity.framework,
                        name = %identity.name,
                        branch = %identity.branch,
                        "No baseline at {}; promoting candidate",
                        path.display()
                    );
                    self.update_baseline(&identity)?;
                    let resolution = self.resolver.resolve(&identity);
                    results.push(ComparisonResult::bootstrapped(
                        identity.name.clone(),
                        resolution.baseline_path,
                        resolution.compare_path,
                        self.config.diff_threshold,
                        None,
                    ));
                }
                Err(e) if e.is_per_screenshot() => {
                    error!(
                        framework = %identity.framework,
                        name = %identity.name,
                        branch = %identity.branch,
                        "Skipping screenshot: {}",
                        e
                    );
                    skipped.push((name.clone(), e.to_string()));
                }
                Err(e) => return Err(e),
            }
        }

        let mut report = report::aggregate(results, self.config.framework, Utc::now(), &self.git);

        if !self.resolver.is_default_branch(&self.git.branch) && !names.is_empty() {
            let captured: BTreeSet<&String> = names.iter().collect();
            let deleted: Vec<(String, Resolution)> = self
                .baseline_names()?
                .into_iter()
                .filter(|name| !captured.contains(name))
                .map(|name| {
                    let resolution = self.resolver.resolve(&self.identity(&name));
                    (name, resolution)
                })
                .collect();
            if !deleted.is_empty() {
                warn!("{} baseline(s) have no candidate on this branch", deleted.len());
            }
            report::mark_deleted(&mut report, self.config.diff_threshold, deleted);
        }

        if let Some(prior) = self.load_approvals()? {
            report::overlay_approvals(&mut report, &prior);
        }

        let summary = report::diff_summary(&report);
        let snapshot = approvals::snapshot(&report, &self.git, Utc::now());

        write_json_atomic(&self.config.report_path(), &report)?;
        write_json_atomic(&self.config.approvals_path(), &snapshot)?;
        write_json_atomic(&self.config.diff_summary_path(), &summary)?;

        info!(
            "Report: {} total, {} passed, {} changed, {} skipped",
            report.metadata.total_tests,
            report.metadata.passed_tests,
            report.metadata.changed_tests,
            skipped.len()
        );

        Ok(BatchReport {
            report,
            summary,
            skipped,
        })
    }

    /// Copy the candidate over the baseline
    pub fn update_baseline(&self, identity: &ScreenshotIdentity) -> VisregResult<PathBuf> {
        let resolution = self.resolver.resolve(identity);
        promote(&resolution.compare_path, &resolution.baseline_path)?;
        info!("Updated baseline for '{}'", identity.name);
        Ok(resolution.baseline_path)
    }

    /// Apply accept/reject decisions to the stored report, update baselines
    /// for accepted tests, and record the decisions in the history.
    pub fn decide(&self, decisions: &Decisions) -> VisregResult<DecisionOutcome> {
        let _lock = ReportLock::acquire(&self.config.lock_path())?;

        let report_path = self.config.report_path();
        let mut report: ReportData = read_json(&report_path)?.ok_or_else(|| {
            VisregError::ReportMissing {
                path: report_path.clone(),
            }
        })?;

        let unknown = approvals::apply_decisions(&mut report, decisions);
        for name in &unknown {
            warn!("Ignoring decision for '{}': not in the report", name);
        }

        let mut updated_baselines = Vec::new();
        for (name, decision) in decisions {
            if decision.action != DecisionAction::Accept {
                continue;
            }
            let Some(test) = report.find(name) else {
                continue;
            };
            match test.status {
                TestStatus::New => {}
                TestStatus::Deleted => {
                    remove_if_exists(&test.result.baseline_path)?;
                    updated_baselines.push(test.result.baseline_path.clone());
                }
                _ => {
                    promote(&test.result.compare_path, &test.result.baseline_path)?;
                    updated_baselines.push(test.result.baseline_path.clone());
                }
            }
        }

        // Decisions made earlier for the same commit are kept
        let mut merged: Decisions = self
            .history
            .load()?
            .commits
            .into_iter()
            .find(|c| c.short_sha == self.git.short_sha)
            .map(|c| c.approvals)
            .unwrap_or_default();
        merged.retain(|name, _| report.find(name).is_some());
        merged.extend(
            decisions
                .iter()
                .filter(|(name, _)| !unknown.contains(*name))
                .map(|(name, d)| (name.clone(), *d)),
        );

        let snapshot = approvals::snapshot(&report, &self.git, Utc::now());
        write_json_atomic(&report_path, &report)?;
        write_json_atomic(&self.config.approvals_path(), &snapshot)?;
        let commit = self
            .history
            .record_unlocked(&merged, &self.git, report.tests.len())?;

        Ok(DecisionOutcome {
            report,
            approvals: snapshot,
            commit,
            unknown,
            updated_baselines,
        })
    }

    /// Names whose first capture on the current branch became the baseline
    pub fn bootstrapped_names(&self) -> VisregResult<BTreeSet<String>> {
        Ok(read_json(&self.bootstrap_marker())?.unwrap_or_default())
    }

    fn bootstrap_marker(&self) -> PathBuf {
        self.resolver.bootstrap_marker_path(self.config.framework, &self.git.branch)
    }

    fn set_bootstrapped(&self, name: &str, bootstrapped: bool) -> VisregResult<()> {
        let _lock = ReportLock::acquire(&self.config.lock_path())?;
        let path = self.bootstrap_marker();
        let mut names: BTreeSet<String> = read_json(&path)?.unwrap_or_default();
        let changed = if bootstrapped {
            names.insert(name.to_string())
        } else {
            names.remove(name)
        };
        if changed {
            write_json_atomic(&path, &names)?;
        }
        Ok(())
    }

    pub fn load_report(&self) -> VisregResult<Option<ReportData>> {
        Ok(read_json(&self.config.report_path())?)
    }

    pub fn load_approvals(&self) -> VisregResult<Option<ApprovalsSnapshot>> {
        Ok(read_json(&self.config.approvals_path())?)
    }

    pub fn load_history(&self) -> VisregResult<HistoryData> {
        self.history.load()
    }

    /// Serialized report, history and approvals for an offline viewer
    pub fn embedded_payload(&self) -> VisregResult<String> {
        let report_path = self.config.report_path();
        let report = self
            .load_report()?
            .ok_or(VisregError::ReportMissing { path: report_path })?;
        let history = self.load_history()?;
        let approvals = self.load_approvals()?;
        Ok(report::embedded_payload(&report, &history, approvals.as_ref())?)
    }
}

/// Atomically copy `from` over `to`
fn promote(from: &Path, to: &Path) -> VisregResult<()> {
    let bytes = match std::fs::read(from) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(VisregError::CandidateMissing {
                path: from.to_path_buf(),
            })
        }
        Err(e) => return Err(VisregError::io(from, e)),
    };
    write_atomic(to, &bytes)?;
    Ok(())
}

fn remove_if_exists(path: &Path) -> VisregResult<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(VisregError::io(path, e)),
    }
}

/// Sorted file stems of `*.png` files directly inside `dir`
fn png_stems(dir: &Path) -> VisregResult<Vec<String>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut names = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(dir).to_path_buf();
            VisregError::io(path, e.into())
        })?;
        let path = entry.path();
        if entry.file_type().is_file() && path.extension().map(|e| e == "png").unwrap_or(false) {
            if let Some(stem) = path.file_stem() {
                names.push(stem.to_string_lossy().to_string());
            }
        }
    }
    names.sort();
    Ok(names)
}
