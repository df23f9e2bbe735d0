//! Bounded, commit-keyed review history (`history.json`)
//!
//! Commits are kept newest first. Recording a commit that is already present
//! (matched by short SHA) replaces it in place, so re-recording the same
//! decisions is a no-op on the stored state.

use std::path::{Path, PathBuf};
use tracing::{info, warn};

use visreg_common::store::{read_json, write_json_atomic, ReportLock};
use visreg_common::{
    DecisionAction, Decisions, GitContext, HistoryCommit, HistoryData, HistorySummary,
    VisregConfig,
};

use crate::error::{VisregError, VisregResult};

/// File-backed history ledger
#[derive(Debug, Clone)]
pub struct HistoryStore {
    path: PathBuf,
    lock_path: PathBuf,
    max_history: usize,
}

impl HistoryStore {
    pub fn new(
        path: impl Into<PathBuf>,
        lock_path: impl Into<PathBuf>,
        max_history: usize,
    ) -> Self {
        Self {
            path: path.into(),
            lock_path: lock_path.into(),
            max_history: max_history.max(1),
        }
    }

    pub fn from_config(config: &VisregConfig) -> Self {
        Self::new(config.history_path(), config.lock_path(), config.max_history)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the ledger, failing on malformed content
    pub fn load_strict(&self) -> VisregResult<HistoryData> {
        match read_json::<HistoryData>(&self.path) {
            Ok(Some(history)) => Ok(history),
            Ok(None) => Ok(self.empty()),
            Err(visreg_common::Error::Parse { path, reason }) => {
                Err(VisregError::HistoryCorrupt { path, reason })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Load the ledger. A missing file or malformed content yields an empty
    /// ledger; other I/O failures are returned.
    pub fn load(&self) -> VisregResult<HistoryData> {
        match self.load_strict() {
            Err(e @ VisregError::HistoryCorrupt { .. }) => {
                warn!("{}; starting a fresh history", e);
                Ok(self.empty())
            }
            other => other,
        }
    }

    pub fn save(&self, history: &HistoryData) -> VisregResult<()> {
        write_json_atomic(&self.path, history)?;
        Ok(())
    }

    /// Record decisions for the current commit and persist the ledger.
    ///
    /// The whole load-upsert-save span runs under the report lock.
    pub fn record_approvals(
        &self,
        decisions: &Decisions,
        git: &GitContext,
        total_tests: usize,
    ) -> VisregResult<HistoryCommit> {
        let _lock = ReportLock::acquire(&self.lock_path)?;
        self.record_unlocked(decisions, git, total_tests)
    }

    /// [`HistoryStore::record_approvals`] for callers already holding the
    /// report lock
    pub(crate) fn record_unlocked(
        &self,
        decisions: &Decisions,
        git: &GitContext,
        total_tests: usize,
    ) -> VisregResult<HistoryCommit> {
        let mut history = self.load()?;
        history.max_history = self.max_history;

        let commit = build_commit(decisions, git, total_tests);
        upsert(&mut history, commit.clone());
        self.save(&history)?;

        info!(
            "Recorded {} decision(s) for commit {} ({} commit(s) in history)",
            decisions.len(),
            commit.short_sha,
            history.commits.len()
        );
        Ok(commit)
    }

    fn empty(&self) -> HistoryData {
        HistoryData {
            max_history: self.max_history,
            commits: Vec::new(),
        }
    }
}

/// Build a history entry from the commit facts and decisions
pub fn build_commit(decisions: &Decisions, git: &GitContext, total_tests: usize) -> HistoryCommit {
    let accepted = decisions
        .values()
        .filter(|d| d.action == DecisionAction::Accept)
        .count();
    let rejected = decisions.len() - accepted;
    let total_tests = total_tests.max(decisions.len());

    HistoryCommit {
        short_sha: git.short_sha.clone(),
        full_sha: git.sha.clone(),
        author: git.author.clone(),
        email: git.email.clone(),
        date: git.date.clone(),
        message: git.message.clone(),
        branch: git.branch.clone(),
        approval_timestamp: decisions.values().map(|d| d.timestamp).max(),
        approvals: decisions.clone(),
        summary: HistorySummary {
            total_tests,
            accepted,
            rejected,
            pending: total_tests - accepted - rejected,
        },
    }
}

/// Replace the commit with the same short SHA, or prepend it, then trim the
/// oldest entries beyond `max_history`
pub fn upsert(history: &mut HistoryData, commit: HistoryCommit) {
    match history
        .commits
        .iter()
        .position(|c| c.short_sha == commit.short_sha)
    {
        Some(idx) => history.commits[idx] = commit,
        None => history.commits.insert(0, commit),
    }
    history.commits.truncate(history.max_history.max(1));
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;
    use visreg_common::Decision;

    fn git(n: usize) -> GitContext {
        GitContext {
            branch: "feature/x".to_string(),
            sha: format!("{:040}", n),
            short_sha: format!("{:07}", n),
            author: "Ada".to_string(),
            email: "ada@example.com".to_string(),
            date: "2024-05-01T12:00:00Z".to_string(),
            message: format!("commit {}", n),
        }
    }

    fn decisions() -> Decisions {
        let t = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let mut d = Decisions::new();
        d.insert("home".to_string(), Decision::accept(t));
        d.insert(
            "login".to_string(),
            Decision::reject(t + chrono::Duration::seconds(5)),
        );
        d
    }

    fn store(tmp: &TempDir, max: usize) -> HistoryStore {
        HistoryStore::new(tmp.path().join("history.json"), tmp.path().join(".lock"), max)
    }

    #[test]
    fn test_missing_file_initializes_empty() {
        let tmp = TempDir::new().unwrap();
        let history = store(&tmp, 5).load().unwrap();
        assert_eq!(history, HistoryData::default());
    }

    #[test]
    fn test_corrupt_file_recovers_empty() {
        let tmp = TempDir::new().unwrap();
        let s = store(&tmp, 5);
        std::fs::write(s.path(), "{\"commits\": [").unwrap();

        assert!(matches!(s.load_strict(), Err(VisregError::HistoryCorrupt { .. })));
        assert!(s.load().unwrap().commits.is_empty());
    }

    #[test]
    fn test_record_summary() {
        let tmp = TempDir::new().unwrap();
        let commit = store(&tmp, 5)
            .record_approvals(&decisions(), &git(1), 4)
            .unwrap();

        assert_eq!(commit.summary.total_tests, 4);
        assert_eq!(commit.summary.accepted, 1);
        assert_eq!(commit.summary.rejected, 1);
        assert_eq!(commit.summary.pending, 2);
        assert_eq!(
            commit.approval_timestamp,
            Some(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 5).unwrap())
        );
    }

    #[test]
    fn test_record_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let s = store(&tmp, 5);

        s.record_approvals(&decisions(), &git(1), 2).unwrap();
        let once = std::fs::read(s.path()).unwrap();
        s.record_approvals(&decisions(), &git(1), 2).unwrap();
        let twice = std::fs::read(s.path()).unwrap();

        assert_eq!(once, twice);
        assert_eq!(s.load().unwrap().commits.len(), 1);
    }

    #[test]
    fn test_history_is_bounded_newest_first() {
        let tmp = TempDir::new().unwrap();
        let s = store(&tmp, 5);
        for n in 1..=8 {
            s.record_approvals(&decisions(), &git(n), 2).unwrap();
        }

        let history = s.load().unwrap();
        let shas: Vec<&str> = history.commits.iter().map(|c| c.short_sha.as_str()).collect();
        assert_eq!(
            shas,
            vec!["0000008", "0000007", "0000006", "0000005", "0000004"]
        );
    }

    #[test]
    fn test_existing_commit_replaced_in_place() {
        let mut history = HistoryData::default();
        for n in 1..=3 {
            upsert(&mut history, build_commit(&decisions(), &git(n), 2));
        }

        let mut only_home = decisions();
        only_home.remove("login");
        upsert(&mut history, build_commit(&only_home, &git(2), 2));

        assert_eq!(history.commits.len(), 3);
        assert_eq!(history.commits[1].short_sha, "0000002");
        assert_eq!(history.commits[1].approvals.len(), 1);
        assert_eq!(history.commits[0].short_sha, "0000003");
    }
}
