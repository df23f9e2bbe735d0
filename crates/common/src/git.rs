//! Source-control fact sheet
//!
//! The workflow only needs a handful of read-only facts about the current
//! commit. They are fetched through [`GitInfoSource`]; callers collapse any
//! fetch error to [`GitContext::unknown`] so comparisons and reports keep
//! working outside a repository.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;

use crate::{Error, Result};

/// Value used for every field when git metadata cannot be read
pub const UNKNOWN: &str = "unknown";

const SHORT_SHA_LENGTH: usize = 7;

/// Metadata about the commit under test
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GitContext {
    pub branch: String,
    pub sha: String,
    pub short_sha: String,
    pub author: String,
    pub email: String,
    pub date: String,
    pub message: String,
}

impl GitContext {
    /// The fixed sentinel used when metadata is unavailable
    pub fn unknown() -> Self {
        Self {
            branch: UNKNOWN.to_string(),
            sha: UNKNOWN.to_string(),
            short_sha: UNKNOWN.to_string(),
            author: UNKNOWN.to_string(),
            email: UNKNOWN.to_string(),
            date: UNKNOWN.to_string(),
            message: UNKNOWN.to_string(),
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.sha == UNKNOWN
    }

    /// Replace the branch, e.g. from a CI-provided override
    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = branch.into();
        self
    }
}

/// Capability that reads commit metadata
pub trait GitInfoSource {
    fn fetch(&self) -> Result<GitContext>;
}

/// Reads metadata by shelling out to the `git` binary
#[derive(Debug, Clone)]
pub struct GitCli {
    repo_dir: PathBuf,
}

impl GitCli {
    pub fn new(repo_dir: impl AsRef<Path>) -> Self {
        Self {
            repo_dir: repo_dir.as_ref().to_path_buf(),
        }
    }

    fn git(&self, args: &[&str]) -> Result<String> {
        let output = Command::new("git")
            .arg("-C")
            .arg(&self.repo_dir)
            .args(args)
            .output()
            .map_err(|e| Error::Git(format!("failed to execute git: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Git(format!(
                "git {} failed: {}",
                args.join(" "),
                stderr.trim()
            )));
        }

        String::from_utf8(output.stdout)
            .map_err(|_| Error::Git("invalid UTF-8 in git output".to_string()))
    }
}

impl GitInfoSource for GitCli {
    fn fetch(&self) -> Result<GitContext> {
        let branch = self.git(&["rev-parse", "--abbrev-ref", "HEAD"])?;
        let log = self.git(&["log", "-1", "--format=%H%n%an%n%ae%n%cI%n%s"])?;

        let lines: Vec<&str> = log.lines().collect();
        if lines.len() < 5 {
            return Err(Error::Git("insufficient commit data".to_string()));
        }

        let sha = lines[0].trim().to_string();
        let short_sha: String = sha.chars().take(SHORT_SHA_LENGTH).collect();
        debug!("Resolved git commit {} on {}", short_sha, branch.trim());

        Ok(GitContext {
            branch: branch.trim().to_string(),
            sha,
            short_sha,
            author: lines[1].to_string(),
            email: lines[2].to_string(),
            date: lines[3].to_string(),
            message: lines[4].to_string(),
        })
    }
}

/// A fixed fact sheet, for callers that already know the commit
#[derive(Debug, Clone)]
pub struct StaticGitInfo(pub GitContext);

impl GitInfoSource for StaticGitInfo {
    fn fetch(&self) -> Result<GitContext> {
        Ok(self.0.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_unknown_sentinel() {
        let ctx = GitContext::unknown();
        assert!(ctx.is_unknown());
        assert_eq!(ctx.branch, UNKNOWN);
        assert_eq!(ctx.message, UNKNOWN);
    }

    #[test]
    fn test_git_cli_outside_repo_fails() {
        let dir = tempdir().unwrap();
        assert!(matches!(GitCli::new(dir.path()).fetch(), Err(Error::Git(_))));
    }

    #[test]
    fn test_static_source() {
        let ctx = GitContext::unknown().with_branch("feature/x");
        assert_eq!(StaticGitInfo(ctx.clone()).fetch().unwrap(), ctx);
    }

    #[test]
    fn test_git_cli_reads_commit() {
        let dir = tempdir().unwrap();
        let repo = dir.path();
        let run = |args: &[&str]| {
            Command::new("git")
                .args(args)
                .current_dir(repo)
                .output()
                .map(|o| o.status.success())
                .unwrap_or(false)
        };

        // Skip when git is not installed
        if !run(&["init", "-b", "main"]) {
            return;
        }
        run(&["config", "user.name", "Ada"]);
        run(&["config", "user.email", "ada@example.com"]);
        std::fs::write(repo.join("a.txt"), "a").unwrap();
        run(&["add", "a.txt"]);
        if !run(&["commit", "-m", "initial commit"]) {
            return;
        }

        let ctx = GitCli::new(repo).fetch().unwrap();
        assert_eq!(ctx.branch, "main");
        assert_eq!(ctx.author, "Ada");
        assert_eq!(ctx.email, "ada@example.com");
        assert_eq!(ctx.message, "initial commit");
        assert_eq!(ctx.short_sha.len(), SHORT_SHA_LENGTH);
        assert!(ctx.sha.starts_with(&ctx.short_sha));
    }
}
