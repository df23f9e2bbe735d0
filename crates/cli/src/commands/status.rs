//! Status Command
//!
//! Summarizes the stored report by review bucket.

use anyhow::Result;
use serde::Serialize;

use visreg_engine::report;

use super::Context;
use crate::output::{print_item, print_message, TableDisplay};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusView {
    commit: String,
    branch: String,
    framework: String,
    total: usize,
    passed: usize,
    changed: usize,
    new: usize,
    deleted: usize,
    approved: usize,
    rejected: usize,
    pending: usize,
}

impl TableDisplay for StatusView {
    fn headers() -> Vec<&'static str> {
        vec![
            "Commit", "Branch", "Framework", "Total", "Passed", "Changed", "New", "Deleted",
            "Approved", "Rejected", "Pending",
        ]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.commit.clone(),
            self.branch.clone(),
            self.framework.clone(),
            self.total.to_string(),
            self.passed.to_string(),
            self.changed.to_string(),
            self.new.to_string(),
            self.deleted.to_string(),
            self.approved.to_string(),
            self.rejected.to_string(),
            self.pending.to_string(),
        ]
    }
}

pub fn execute(ctx: &Context) -> Result<()> {
    let workflow = ctx.workflow()?;
    let Some(report) = workflow.load_report()? else {
        print_message("No report found; run `visreg compare` first", ctx.format);
        return Ok(());
    };

    let grouped = report::group(&report);
    let summary = report::diff_summary(&report);
    let git = &report.metadata.git_info;

    print_item(
        &StatusView {
            commit: git.short_sha.clone(),
            branch: git.branch.clone(),
            framework: report.metadata.framework.to_string(),
            total: summary.summary.total_tests,
            passed: summary.summary.passed_tests,
            changed: summary.summary.changed_tests,
            new: summary.summary.new_tests,
            deleted: summary.summary.deleted_tests,
            approved: grouped.approved.len(),
            rejected: grouped.rejected.len(),
            pending: grouped.pending.len(),
        },
        ctx.format,
    );
    Ok(())
}
