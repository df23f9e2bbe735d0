//! Capture Command
//!
//! Hands a screenshot written by the test runner to the workflow, which
//! stores it as the baseline or as a candidate for the current branch.

use anyhow::{Context as _, Result};
use clap::Args;
use serde::Serialize;
use std::path::PathBuf;

use visreg_engine::{CaptureOptions, CaptureOutcome, FileDriver};

use super::Context;
use crate::output::{print_item, TableDisplay};

#[derive(Args)]
pub struct CaptureArgs {
    /// PNG file produced by the test runner
    pub file: PathBuf,

    /// Screenshot name
    #[arg(long, conflicts_with = "target", required_unless_present = "target")]
    pub name: Option<String>,

    /// Page URL or route to derive the name from
    #[arg(long)]
    pub target: Option<String>,

    /// The screenshot covers the full scrollable page
    #[arg(long)]
    pub full_page: bool,

    /// The screenshot covers a single element
    #[arg(long)]
    pub selector: Option<String>,
}

#[derive(Serialize)]
struct CaptureRow {
    name: String,
    branch: String,
    mode: &'static str,
    path: PathBuf,
}

impl TableDisplay for CaptureRow {
    fn headers() -> Vec<&'static str> {
        vec!["Name", "Branch", "Stored As", "Path"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.name.clone(),
            self.branch.clone(),
            self.mode.to_string(),
            self.path.display().to_string(),
        ]
    }
}

pub async fn execute(args: CaptureArgs, ctx: &Context) -> Result<()> {
    let workflow = ctx.workflow()?;
    let identity = match (&args.name, &args.target) {
        (Some(name), _) => workflow.identity(name),
        (None, Some(target)) => workflow.identity_for_target(target),
        (None, None) => anyhow::bail!("either --name or --target is required"),
    };

    let driver = FileDriver::new(workflow.config().framework, &args.file);
    let options = CaptureOptions {
        full_page: args.full_page,
        selector: args.selector,
        viewport: None,
    };

    let outcome = workflow
        .capture(&identity, &driver, &options)
        .await
        .with_context(|| format!("Failed to capture '{}'", identity.name))?;

    let (mode, path) = match outcome {
        CaptureOutcome::Baseline { result } => ("baseline", result.baseline_path),
        CaptureOutcome::Candidate { path, .. } => ("candidate", path),
    };

    print_item(
        &CaptureRow {
            name: identity.name,
            branch: identity.branch,
            mode,
            path,
        },
        ctx.format,
    );
    Ok(())
}
