//! History Command

use anyhow::Result;
use clap::Args;

use visreg_common::HistoryCommit;

use super::Context;
use crate::output::{print_list, TableDisplay};

const MESSAGE_DISPLAY_LENGTH: usize = 48;

#[derive(Args)]
pub struct HistoryArgs {
    /// Show only the N most recent commits
    #[arg(short, long)]
    pub limit: Option<usize>,
}

impl TableDisplay for HistoryCommit {
    fn headers() -> Vec<&'static str> {
        vec![
            "Commit", "Branch", "Author", "Reviewed", "Accepted", "Rejected", "Pending", "Message",
        ]
    }

    fn row(&self) -> Vec<String> {
        let message = if self.message.chars().count() > MESSAGE_DISPLAY_LENGTH {
            let cut: String = self.message.chars().take(MESSAGE_DISPLAY_LENGTH).collect();
            format!("{}…", cut)
        } else {
            self.message.clone()
        };
        vec![
            self.short_sha.clone(),
            self.branch.clone(),
            self.author.clone(),
            self.approval_timestamp
                .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_else(|| "-".to_string()),
            self.summary.accepted.to_string(),
            self.summary.rejected.to_string(),
            self.summary.pending.to_string(),
            message,
        ]
    }
}

pub fn execute(args: HistoryArgs, ctx: &Context) -> Result<()> {
    let workflow = ctx.workflow()?;
    let mut commits = workflow.load_history()?.commits;
    if let Some(limit) = args.limit {
        commits.truncate(limit);
    }
    print_list(&commits, ctx.format);
    Ok(())
}
