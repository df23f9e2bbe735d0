//! Resolve Command

use anyhow::Result;
use clap::Args;
use serde::Serialize;
use std::path::PathBuf;

use super::Context;
use crate::output::{print_item, TableDisplay};

#[derive(Args)]
pub struct ResolveArgs {
    /// Screenshot name
    #[arg(conflicts_with = "target", required_unless_present = "target")]
    pub name: Option<String>,

    /// Page URL or route to derive the name from
    #[arg(long)]
    pub target: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ResolutionView {
    name: String,
    branch: String,
    is_default_branch: bool,
    should_use_baseline: bool,
    baseline_path: PathBuf,
    compare_path: PathBuf,
    diff_path: PathBuf,
}

impl TableDisplay for ResolutionView {
    fn headers() -> Vec<&'static str> {
        vec!["Name", "Branch", "Mode", "Baseline", "Candidate", "Diff"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.name.clone(),
            self.branch.clone(),
            if self.should_use_baseline { "baseline" } else { "compare" }.to_string(),
            self.baseline_path.display().to_string(),
            self.compare_path.display().to_string(),
            self.diff_path.display().to_string(),
        ]
    }
}

pub fn execute(args: ResolveArgs, ctx: &Context) -> Result<()> {
    let workflow = ctx.workflow()?;
    let identity = match (&args.name, &args.target) {
        (Some(name), _) => workflow.identity(name),
        (None, Some(target)) => workflow.identity_for_target(target),
        (None, None) => anyhow::bail!("either a name or --target is required"),
    };

    let resolution = workflow.resolve(&identity);
    print_item(
        &ResolutionView {
            name: identity.name,
            branch: identity.branch,
            is_default_branch: resolution.is_default_branch,
            should_use_baseline: resolution.should_use_baseline,
            baseline_path: resolution.baseline_path,
            compare_path: resolution.compare_path,
            diff_path: resolution.diff_path,
        },
        ctx.format,
    );
    Ok(())
}
