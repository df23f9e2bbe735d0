//! End-to-end workflow tests against a temporary directory tree

use chrono::{Duration, TimeZone, Utc};
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use std::io::Cursor;
use std::path::Path;
use tempfile::TempDir;

use visreg_common::{
    ApprovalStatus, Decision, Decisions, Framework, GitContext, StaticGitInfo, TestStatus,
    VisregConfig,
};
use visreg_engine::{CaptureOptions, CaptureOutcome, FileDriver, VisregError, Workflow};

const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);

fn config(root: &Path) -> VisregConfig {
    VisregConfig {
        framework: Framework::Playwright,
        baseline_dir: root.join("baseline"),
        compare_dir: root.join("compare"),
        report_dir: root.join("report"),
        ..VisregConfig::default()
    }
}

fn git(branch: &str, n: u32) -> GitContext {
    GitContext {
        branch: branch.to_string(),
        sha: format!("{:040}", n),
        short_sha: format!("{:07}", n),
        author: "Ada".to_string(),
        email: "ada@example.com".to_string(),
        date: "2024-05-01T12:00:00Z".to_string(),
        message: format!("commit {}", n),
    }
}

fn png(image: RgbaImage) -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(image)
        .write_to(&mut buf, ImageFormat::Png)
        .unwrap();
    buf.into_inner()
}

/// 10x10 white square
fn plain() -> Vec<u8> {
    png(RgbaImage::from_pixel(10, 10, WHITE))
}

/// 10x10 white square with a 5x5 black block: 25% of the pixels differ
fn with_block() -> Vec<u8> {
    let mut image = RgbaImage::from_pixel(10, 10, WHITE);
    for y in 2..7 {
        for x in 2..7 {
            image.put_pixel(x, y, BLACK);
        }
    }
    png(image)
}

fn workflow(root: &Path, branch: &str, n: u32) -> Workflow {
    Workflow::new(config(root), git(branch, n)).unwrap()
}

/// Store `main` baselines for each name
fn seed_baselines(root: &Path, names: &[&str]) {
    let main = workflow(root, "main", 1);
    for name in names {
        let outcome = main.store_capture(&main.identity(name), &plain()).unwrap();
        assert!(matches!(outcome, CaptureOutcome::Baseline { .. }));
    }
}

#[test]
fn test_default_branch_capture_writes_baseline() {
    let tmp = TempDir::new().unwrap();
    let wf = workflow(tmp.path(), "main", 1);
    let identity = wf.identity("home");

    let outcome = wf.store_capture(&identity, &plain()).unwrap();

    let CaptureOutcome::Baseline { result } = outcome else {
        panic!("expected a baseline capture");
    };
    let expected = tmp.path().join("baseline/playwright/home.png");
    assert_eq!(result.baseline_path, expected);
    assert!(result.passed);
    assert!(result.diff_path.is_none());
    assert!(expected.exists());
    assert!(!tmp.path().join("report").exists());
}

#[test]
fn test_feature_branch_without_baseline_bootstraps() {
    let tmp = TempDir::new().unwrap();
    let wf = workflow(tmp.path(), "feature/x", 2);

    let outcome = wf.store_capture(&wf.identity("home"), &plain()).unwrap();
    assert!(matches!(outcome, CaptureOutcome::Baseline { .. }));
    assert!(tmp.path().join("baseline/playwright/home.png").exists());
}

#[test]
fn test_changed_candidate_on_feature_branch() {
    let tmp = TempDir::new().unwrap();
    seed_baselines(tmp.path(), &["home"]);

    let wf = workflow(tmp.path(), "feature/x", 2);
    let outcome = wf.store_capture(&wf.identity("home"), &with_block()).unwrap();
    let CaptureOutcome::Candidate { path, .. } = outcome else {
        panic!("expected a candidate capture");
    };
    assert_eq!(path, tmp.path().join("compare/feature-x/playwright/home.png"));

    let batch = wf.compare_all().unwrap();
    let test = batch.report.find("home").unwrap();

    assert_eq!(test.status, TestStatus::Changed);
    assert!(!test.result.passed);
    assert_eq!(test.result.diff_percentage, Some(0.25));
    assert_eq!(test.viewport.as_deref(), Some("10x10"));
    assert_eq!(batch.report.metadata.changed_tests, 1);
    assert_eq!(batch.report.metadata.passed_tests, 0);
    assert!(tmp.path().join("report/diffs/playwright/home.png").exists());

    assert!(batch.summary.summary.has_differences);
    assert_eq!(batch.summary.tests_with_differences.len(), 1);
    assert!(tmp.path().join("report/compare-report.json").exists());
    assert!(tmp.path().join("report/approvals.json").exists());
    assert!(tmp.path().join("report/diffs/diffs.json").exists());
}

#[test]
fn test_identical_candidate_passes() {
    let tmp = TempDir::new().unwrap();
    seed_baselines(tmp.path(), &["home"]);

    let wf = workflow(tmp.path(), "feature/x", 2);
    wf.store_capture(&wf.identity("home"), &plain()).unwrap();

    let batch = wf.compare_all().unwrap();
    let test = batch.report.find("home").unwrap();
    assert_eq!(test.status, TestStatus::Passed);
    assert_eq!(test.result.diff_percentage, Some(0.0));
    assert!(!batch.summary.summary.has_differences);
}

#[test]
fn test_missing_candidate_leaves_report_untouched() {
    let tmp = TempDir::new().unwrap();
    seed_baselines(tmp.path(), &["home"]);

    let wf = workflow(tmp.path(), "feature/x", 2);
    let err = wf.compare_one(&wf.identity("home")).unwrap_err();

    assert!(matches!(err, VisregError::CandidateMissing { .. }));
    assert!(!tmp.path().join("report/diffs/playwright/home.png").exists());
    assert!(wf.load_report().unwrap().is_none());
}

#[test]
fn test_dimension_mismatch_is_skipped() {
    let tmp = TempDir::new().unwrap();
    seed_baselines(tmp.path(), &["home", "login"]);

    let wf = workflow(tmp.path(), "feature/x", 2);
    wf.store_capture(&wf.identity("home"), &png(RgbaImage::from_pixel(12, 10, WHITE)))
        .unwrap();
    wf.store_capture(&wf.identity("login"), &plain()).unwrap();

    let batch = wf.compare_all().unwrap();
    assert_eq!(batch.skipped.len(), 1);
    assert_eq!(batch.skipped[0].0, "home");
    assert!(batch.report.find("home").is_none());
    assert!(batch.report.find("login").is_some());
    assert!(!tmp.path().join("report/diffs/playwright/home.png").exists());
}

#[test]
fn test_baselines_without_candidates_are_deleted() {
    let tmp = TempDir::new().unwrap();
    seed_baselines(tmp.path(), &["about", "home"]);

    let wf = workflow(tmp.path(), "feature/x", 2);
    wf.store_capture(&wf.identity("home"), &plain()).unwrap();

    let batch = wf.compare_all().unwrap();
    assert_eq!(batch.report.find("about").unwrap().status, TestStatus::Deleted);
    assert_eq!(batch.summary.summary.deleted_tests, 1);
    assert_eq!(batch.report.metadata.total_tests, 2);
}

#[test]
fn test_new_screenshot_on_feature_branch_is_new() {
    let tmp = TempDir::new().unwrap();
    seed_baselines(tmp.path(), &["home"]);

    let wf = workflow(tmp.path(), "feature/x", 2);
    wf.store_capture(&wf.identity("home"), &with_block()).unwrap();
    let outcome = wf.store_capture(&wf.identity("signup"), &plain()).unwrap();
    assert!(matches!(outcome, CaptureOutcome::Baseline { .. }));

    let batch = wf.compare_all().unwrap();
    let signup = batch.report.find("signup").unwrap();
    assert_eq!(signup.status, TestStatus::New);
    assert!(signup.result.is_bootstrap());
    assert_eq!(batch.report.find("home").unwrap().status, TestStatus::Changed);
    assert_eq!(batch.summary.summary.new_tests, 1);
    assert_eq!(batch.summary.summary.deleted_tests, 0);

    let t = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
    let mut decisions = Decisions::new();
    decisions.insert("signup".to_string(), Decision::accept(t));
    let outcome = wf.decide(&decisions).unwrap();

    assert!(outcome.updated_baselines.is_empty());
    assert_eq!(outcome.approvals.approved, vec!["signup".to_string()]);
    let baseline = tmp.path().join("baseline/playwright/signup.png");
    assert_eq!(std::fs::read(&baseline).unwrap(), plain());

    // A later capture on the branch is compared against the bootstrapped baseline
    wf.store_capture(&wf.identity("signup"), &with_block()).unwrap();
    assert!(wf.bootstrapped_names().unwrap().is_empty());
    let batch = wf.compare_all().unwrap();
    assert_eq!(batch.report.find("signup").unwrap().status, TestStatus::Changed);
}

#[test]
fn test_decide_updates_baseline_and_history() {
    let tmp = TempDir::new().unwrap();
    seed_baselines(tmp.path(), &["home", "login"]);

    let wf = workflow(tmp.path(), "feature/x", 2);
    wf.store_capture(&wf.identity("home"), &with_block()).unwrap();
    wf.store_capture(&wf.identity("login"), &with_block()).unwrap();
    wf.compare_all().unwrap();

    let t = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
    let mut decisions = Decisions::new();
    decisions.insert("home".to_string(), Decision::accept(t));
    decisions.insert("ghost".to_string(), Decision::reject(t));

    let outcome = wf.decide(&decisions).unwrap();

    assert_eq!(outcome.unknown, vec!["ghost".to_string()]);
    assert_eq!(
        outcome.report.find("home").unwrap().approval_status,
        Some(ApprovalStatus::Approved)
    );
    assert_eq!(outcome.approvals.approved, vec!["home".to_string()]);
    assert_eq!(outcome.commit.summary.accepted, 1);
    assert_eq!(outcome.commit.summary.pending, 1);

    let baseline = std::fs::read(tmp.path().join("baseline/playwright/home.png")).unwrap();
    assert_eq!(baseline, with_block());

    // A later decision on the same commit is merged into the same entry
    let mut later = Decisions::new();
    later.insert("login".to_string(), Decision::reject(t + Duration::seconds(30)));
    let outcome = wf.decide(&later).unwrap();

    let history = wf.load_history().unwrap();
    assert_eq!(history.commits.len(), 1);
    assert_eq!(outcome.commit.approvals.len(), 2);
    assert_eq!(outcome.commit.summary.rejected, 1);
    assert_eq!(
        outcome.commit.approval_timestamp,
        Some(t + Duration::seconds(30))
    );
}

#[test]
fn test_decide_without_report_fails() {
    let tmp = TempDir::new().unwrap();
    let wf = workflow(tmp.path(), "feature/x", 2);
    let err = wf.decide(&Decisions::new()).unwrap_err();
    assert!(matches!(err, VisregError::ReportMissing { .. }));
}

#[test]
fn test_decisions_overlay_on_recompare() {
    let tmp = TempDir::new().unwrap();
    seed_baselines(tmp.path(), &["home"]);

    let wf = workflow(tmp.path(), "feature/x", 2);
    wf.store_capture(&wf.identity("home"), &with_block()).unwrap();
    wf.compare_all().unwrap();

    let t = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
    let mut decisions = Decisions::new();
    decisions.insert("home".to_string(), Decision::reject(t));
    wf.decide(&decisions).unwrap();

    let batch = wf.compare_all().unwrap();
    assert_eq!(
        batch.report.find("home").unwrap().approval_status,
        Some(ApprovalStatus::Rejected)
    );
}

#[test]
fn test_history_bounded_across_commits() {
    let tmp = TempDir::new().unwrap();
    seed_baselines(tmp.path(), &["home"]);

    let t = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
    for n in 10..17 {
        let wf = workflow(tmp.path(), "feature/x", n);
        wf.store_capture(&wf.identity("home"), &plain()).unwrap();
        wf.compare_all().unwrap();

        let mut decisions = Decisions::new();
        decisions.insert("home".to_string(), Decision::reject(t));
        wf.decide(&decisions).unwrap();
    }

    let history = workflow(tmp.path(), "feature/x", 99).load_history().unwrap();
    assert_eq!(history.commits.len(), 5);
    assert_eq!(history.commits[0].short_sha, "0000016");
    assert_eq!(history.commits[4].short_sha, "0000012");
}

#[test]
fn test_unreadable_git_falls_back_to_sentinel() {
    struct Broken;
    impl visreg_common::GitInfoSource for Broken {
        fn fetch(&self) -> visreg_common::Result<GitContext> {
            Err(visreg_common::Error::Git("not a repository".to_string()))
        }
    }

    let tmp = TempDir::new().unwrap();
    let wf = Workflow::from_source(config(tmp.path()), &Broken).unwrap();
    assert!(wf.git().is_unknown());

    let wf = Workflow::from_source(config(tmp.path()), &StaticGitInfo(git("main", 3))).unwrap();
    assert_eq!(wf.git().short_sha, "0000003");
}

#[test]
fn test_branch_override_wins() {
    let tmp = TempDir::new().unwrap();
    let mut cfg = config(tmp.path());
    cfg.branch_override = Some("release/1.0".to_string());

    let wf = Workflow::new(cfg, git("main", 1)).unwrap();
    assert_eq!(wf.git().branch, "release/1.0");
    assert!(!wf.resolve(&wf.identity("home")).is_default_branch);
}

#[test]
fn test_embedded_payload_contains_all_parts() {
    let tmp = TempDir::new().unwrap();
    seed_baselines(tmp.path(), &["home"]);

    let wf = workflow(tmp.path(), "feature/x", 2);
    wf.store_capture(&wf.identity("home"), &plain()).unwrap();
    wf.compare_all().unwrap();

    let payload = wf.embedded_payload().unwrap();
    let payload: serde_json::Value = serde_json::from_str(&payload).unwrap();
    assert!(payload.get("report").is_some());
    assert!(payload.get("history").is_some());
    assert!(payload.get("approvals").is_some());
}

#[tokio::test]
async fn test_capture_through_file_driver() {
    let tmp = TempDir::new().unwrap();
    let source = tmp.path().join("shot.png");
    std::fs::write(&source, plain()).unwrap();

    let wf = workflow(tmp.path(), "main", 1);
    let driver = FileDriver::new(Framework::Playwright, &source);
    let identity = wf.identity_for_target("https://example.com/account/settings?tab=1");

    let outcome = wf
        .capture(&identity, &driver, &CaptureOptions::default())
        .await
        .unwrap();

    assert!(matches!(outcome, CaptureOutcome::Baseline { .. }));
    assert!(tmp
        .path()
        .join("baseline/playwright/account-settings.png")
        .exists());
}
