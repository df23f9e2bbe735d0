//! Compare Command

use anyhow::{Context as _, Result};
use clap::Args;
use colored::Colorize;

use visreg_common::{ComparisonResult, TestResult, TestStatus};

use super::Context;
use crate::output::{percent, print_item, print_list, print_warning, OutputFormat, TableDisplay};

#[derive(Args)]
pub struct CompareArgs {
    /// Compare one screenshot without writing the report
    #[arg(long)]
    pub name: Option<String>,

    /// Exit with status 1 when any screenshot changed
    #[arg(long)]
    pub fail_on_diff: bool,
}

impl TableDisplay for TestResult {
    fn headers() -> Vec<&'static str> {
        vec!["Name", "Status", "Diff", "Threshold", "Viewport", "Review"]
    }

    fn row(&self) -> Vec<String> {
        let status = match self.status {
            TestStatus::Passed => self.status.to_string().green().to_string(),
            TestStatus::Changed | TestStatus::Failed => self.status.to_string().red().to_string(),
            TestStatus::New | TestStatus::Deleted => self.status.to_string().yellow().to_string(),
        };
        vec![
            self.result.name.clone(),
            status,
            percent(self.result.diff_percentage),
            percent(Some(self.result.threshold)),
            self.viewport.clone().unwrap_or_else(|| "-".to_string()),
            self.approval_status
                .map(|s| s.to_string())
                .unwrap_or_else(|| "-".to_string()),
        ]
    }
}

impl TableDisplay for ComparisonResult {
    fn headers() -> Vec<&'static str> {
        vec!["Name", "Passed", "Diff", "Threshold", "Diff Image"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.name.clone(),
            self.passed.to_string(),
            percent(self.diff_percentage),
            percent(Some(self.threshold)),
            self.diff_path
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "-".to_string()),
        ]
    }
}

pub fn execute(args: CompareArgs, ctx: &Context) -> Result<()> {
    let workflow = ctx.workflow()?;

    if let Some(name) = args.name {
        let identity = workflow.identity(&name);
        let result = workflow
            .compare_one(&identity)
            .with_context(|| format!("Failed to compare '{}'", identity.name))?;
        let passed = result.passed;
        print_item(&result, ctx.format);
        if args.fail_on_diff && !passed {
            std::process::exit(1);
        }
        return Ok(());
    }

    let batch = workflow.compare_all().context("Comparison failed")?;

    match ctx.format {
        OutputFormat::Json => crate::output::print_json(&batch.summary),
        _ => {
            print_list(&batch.report.tests, ctx.format);
            for (name, reason) in &batch.skipped {
                print_warning(&format!("Skipped '{}': {}", name, reason));
            }
            let counts = batch.summary.summary;
            println!(
                "{} total, {} passed, {} changed, {} new, {} deleted",
                counts.total_tests,
                counts.passed_tests,
                counts.changed_tests,
                counts.new_tests,
                counts.deleted_tests
            );
        }
    }

    if args.fail_on_diff && batch.summary.summary.has_differences {
        std::process::exit(1);
    }
    Ok(())
}
