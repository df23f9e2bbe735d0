//! Approve / Reject Commands
//!
//! Records reviewer decisions against the stored report. Accepting a change
//! promotes the candidate to the baseline.

use anyhow::{Context as _, Result};
use chrono::{DateTime, Utc};
use clap::Args;

use visreg_common::naming::sanitize_name;
use visreg_common::{Decision, DecisionAction, Decisions, TestStatus};

use super::Context;
use crate::output::{print_json, print_success, print_warning, OutputFormat};

#[derive(Args)]
pub struct DecideArgs {
    /// Test names to decide
    #[arg(required_unless_present = "all")]
    pub names: Vec<String>,

    /// Decide every undecided test that is not passing
    #[arg(long, conflicts_with = "names")]
    pub all: bool,
}

/// Decisions keyed by the stored screenshot name, as `capture` sanitizes it
fn decisions_for(action: DecisionAction, names: Vec<String>, now: DateTime<Utc>) -> Decisions {
    names
        .into_iter()
        .map(|name| {
            let decision = match action {
                DecisionAction::Accept => Decision::accept(now),
                DecisionAction::Reject => Decision::reject(now),
            };
            (sanitize_name(&name), decision)
        })
        .collect()
}

pub fn execute(action: DecisionAction, args: DecideArgs, ctx: &Context) -> Result<()> {
    let workflow = ctx.workflow()?;

    let names = if args.all {
        let report = workflow
            .load_report()?
            .context("No report found; run `visreg compare` first")?;
        report
            .tests
            .iter()
            .filter(|t| !t.is_decided() && t.status != TestStatus::Passed)
            .map(|t| t.name().to_string())
            .collect()
    } else {
        args.names
    };

    if names.is_empty() {
        print_warning("Nothing to decide");
        return Ok(());
    }

    let decisions = decisions_for(action, names, Utc::now());

    let outcome = workflow.decide(&decisions).context("Failed to record decisions")?;

    if let OutputFormat::Json = ctx.format {
        print_json(&outcome.approvals);
        return Ok(());
    }

    for name in &outcome.unknown {
        print_warning(&format!("'{}' is not in the report", name));
    }
    for path in &outcome.updated_baselines {
        println!("  baseline updated: {}", path.display());
    }

    let verb = match action {
        DecisionAction::Accept => "Approved",
        DecisionAction::Reject => "Rejected",
    };
    print_success(&format!(
        "{} {} test(s) on {} ({} pending)",
        verb,
        decisions.len() - outcome.unknown.len(),
        outcome.commit.short_sha,
        outcome.commit.summary.pending
    ));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_names_match_captured_files() {
        let t = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let decisions = decisions_for(
            DecisionAction::Accept,
            vec!["login page".to_string(), "home".to_string()],
            t,
        );

        let names: Vec<&str> = decisions.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["home", "login-page"]);
        assert_eq!(decisions["login-page"], Decision::accept(t));
    }
}
