//! Current-run decision snapshot (`approvals.json`)

use chrono::{DateTime, Utc};

use visreg_common::{ApprovalsMeta, ApprovalsSnapshot, Decisions, GitContext, ReportData};

use crate::report::group;

/// Apply decisions to the report rows they name. Returns the names that did
/// not match any row.
pub fn apply_decisions(report: &mut ReportData, decisions: &Decisions) -> Vec<String> {
    let mut unknown = Vec::new();
    for (name, decision) in decisions {
        match report.find_mut(name) {
            Some(test) => test.approval_status = Some(decision.action.approval_status()),
            None => unknown.push(name.clone()),
        }
    }
    unknown
}

/// Build the snapshot from the report's current decisions
pub fn snapshot(report: &ReportData, git: &GitContext, now: DateTime<Utc>) -> ApprovalsSnapshot {
    let grouped = group(report);
    ApprovalsSnapshot {
        approved: grouped.approved,
        rejected: grouped.rejected,
        new: grouped.new,
        deleted: grouped.deleted,
        meta: ApprovalsMeta {
            author: git.author.clone(),
            timestamp: now,
            commit_sha: git.sha.clone(),
        },
    }
}
