//! Report aggregation
//!
//! Pure transformations from comparison outcomes to the persisted report
//! shapes: `compare-report.json`, the disposition buckets used by the
//! approvals snapshot, and the CI summary in `diffs/diffs.json`.

use chrono::{DateTime, Utc};
use serde::Serialize;

use visreg_common::{
    ApprovalStatus, ApprovalsSnapshot, ComparisonResult, DiffEntry, DiffSummary,
    DiffSummaryCounts, Framework, GitContext, HistoryData, ReportData, ReportMetadata, TestResult,
    TestStatus, VERSION,
};

use crate::resolver::Resolution;

/// Status implied by a comparison outcome
pub fn status_of(result: &ComparisonResult) -> TestStatus {
    if result.is_bootstrap() {
        TestStatus::New
    } else if result.passed {
        TestStatus::Passed
    } else {
        TestStatus::Changed
    }
}

fn test_result(result: ComparisonResult) -> TestResult {
    let status = status_of(&result);
    let viewport = result.dimensions.map(|d| d.label());
    TestResult {
        result,
        status,
        viewport,
        approval_status: None,
    }
}

/// Build the report for a batch of comparison outcomes
pub fn aggregate(
    results: Vec<ComparisonResult>,
    framework: Framework,
    now: DateTime<Utc>,
    git: &GitContext,
) -> ReportData {
    let tests: Vec<TestResult> = results.into_iter().map(test_result).collect();

    let mut report = ReportData {
        metadata: ReportMetadata {
            generated_at: now,
            git_info: git.clone(),
            total_tests: 0,
            changed_tests: 0,
            passed_tests: 0,
            framework,
            tool_version: VERSION.to_string(),
        },
        tests,
    };
    report.recount();
    report
}

/// Append rows for baselines that no longer have a candidate.
///
/// A deleted row keeps the resolved diff path (no raster is written there)
/// so that a missing `diff_path` still identifies a bootstrapped baseline.
pub fn mark_deleted(
    report: &mut ReportData,
    threshold: f64,
    deleted: impl IntoIterator<Item = (String, Resolution)>,
) {
    for (name, resolution) in deleted {
        if report.find(&name).is_some() {
            continue;
        }
        report.tests.push(TestResult {
            result: ComparisonResult {
                name,
                baseline_path: resolution.baseline_path,
                compare_path: resolution.compare_path,
                diff_path: Some(resolution.diff_path),
                passed: false,
                diff_percentage: None,
                threshold,
                dimensions: None,
            },
            status: TestStatus::Deleted,
            viewport: None,
            approval_status: None,
        });
    }
    report.recount();
}

/// Disposition buckets shown in the review UI
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Grouped {
    pub approved: Vec<String>,
    pub rejected: Vec<String>,
    pub new: Vec<String>,
    pub deleted: Vec<String>,
    pub pending: Vec<String>,
}

/// Group tests by decision first, then by status. Undecided tests that are
/// neither new nor deleted are pending.
pub fn group(report: &ReportData) -> Grouped {
    let mut grouped = Grouped::default();
    for test in &report.tests {
        let name = test.name().to_string();
        match (test.approval_status, test.status) {
            (Some(ApprovalStatus::Approved), _) => grouped.approved.push(name),
            (Some(ApprovalStatus::Rejected), _) => grouped.rejected.push(name),
            (_, TestStatus::New) => grouped.new.push(name),
            (_, TestStatus::Deleted) => grouped.deleted.push(name),
            _ => grouped.pending.push(name),
        }
    }
    grouped
}

/// Overlay decisions recorded for the same commit onto a fresh report
pub fn overlay_approvals(report: &mut ReportData, approvals: &ApprovalsSnapshot) {
    if approvals.meta.commit_sha != report.metadata.git_info.sha {
        return;
    }
    for test in &mut report.tests {
        let name = test.name();
        if approvals.approved.iter().any(|n| n == name) {
            test.approval_status = Some(ApprovalStatus::Approved);
        } else if approvals.rejected.iter().any(|n| n == name) {
            test.approval_status = Some(ApprovalStatus::Rejected);
        }
    }
}

/// Build the CI summary written to `diffs/diffs.json`
pub fn diff_summary(report: &ReportData) -> DiffSummary {
    let count = |status: TestStatus| report.tests.iter().filter(|t| t.status == status).count();

    let tests_with_differences: Vec<DiffEntry> = report
        .tests
        .iter()
        .filter(|t| matches!(t.status, TestStatus::Changed | TestStatus::Failed))
        .map(|t| DiffEntry {
            name: t.result.name.clone(),
            status: t.status,
            diff_percentage: t.result.diff_percentage,
            threshold: t.result.threshold,
            baseline_path: t.result.baseline_path.clone(),
            compare_path: t.result.compare_path.clone(),
            diff_path: t.result.diff_path.clone(),
        })
        .collect();

    let summary = DiffSummaryCounts {
        total_tests: report.metadata.total_tests,
        passed_tests: report.metadata.passed_tests,
        changed_tests: report.metadata.changed_tests,
        new_tests: count(TestStatus::New),
        deleted_tests: count(TestStatus::Deleted),
        has_differences: !tests_with_differences.is_empty(),
    };

    DiffSummary {
        summary,
        tests_with_differences,
        git_info: report.metadata.git_info.clone(),
        generated_at: report.metadata.generated_at,
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EmbeddedPayload<'a> {
    report: &'a ReportData,
    history: &'a HistoryData,
    #[serde(skip_serializing_if = "Option::is_none")]
    approvals: Option<&'a ApprovalsSnapshot>,
}

/// Serialize everything the static viewer needs into one JSON blob
pub fn embedded_payload(
    report: &ReportData,
    history: &HistoryData,
    approvals: Option<&ApprovalsSnapshot>,
) -> serde_json::Result<String> {
    serde_json::to_string(&EmbeddedPayload {
        report,
        history,
        approvals,
    })
}
