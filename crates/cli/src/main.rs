//! Visreg CLI - Main Entry Point
//!
//! Wires configuration, git metadata and the workflow engine together for
//! CI jobs and local review.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use visreg_common::{DecisionAction, Framework};

mod commands;
mod output;

use commands::{capture, compare, decide, export, history, init, resolve, status, Context};

/// Visreg - branch-aware visual regression testing
#[derive(Parser)]
#[command(name = "visreg")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file
    #[arg(short, long, default_value = "visreg.toml", global = true)]
    config: PathBuf,

    /// Repository the git metadata is read from
    #[arg(long, default_value = ".", global = true)]
    repo: PathBuf,

    /// Branch to use instead of the one reported by git
    #[arg(long, global = true)]
    branch: Option<String>,

    /// Framework whose screenshots are processed
    #[arg(long, global = true)]
    framework: Option<Framework>,

    /// Output format
    #[arg(long, default_value = "table", global = true)]
    format: output::OutputFormat,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration file
    Init(init::InitArgs),

    /// Store a screenshot as baseline or candidate
    Capture(capture::CaptureArgs),

    /// Compare candidates against baselines and write the report
    Compare(compare::CompareArgs),

    /// Accept changes and promote candidates to baselines
    Approve(decide::DecideArgs),

    /// Reject changes, keeping the current baselines
    Reject(decide::DecideArgs),

    /// Show the review history
    History(history::HistoryArgs),

    /// Show where a screenshot would be stored
    Resolve(resolve::ResolveArgs),

    /// Summarize the current report
    Status,

    /// Write the report, history and approvals as one JSON document
    Export(export::ExportArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging; stdout is reserved for command output
    let log_level = if cli.verbose { "debug" } else { "info" };
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr);
    if cli.log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    let ctx = Context {
        config_path: cli.config,
        repo: cli.repo,
        branch: cli.branch,
        framework: cli.framework,
        format: cli.format,
    };

    match cli.command {
        Commands::Init(args) => init::execute(args, &ctx)?,
        Commands::Capture(args) => capture::execute(args, &ctx).await?,
        Commands::Compare(args) => compare::execute(args, &ctx)?,
        Commands::Approve(args) => decide::execute(DecisionAction::Accept, args, &ctx)?,
        Commands::Reject(args) => decide::execute(DecisionAction::Reject, args, &ctx)?,
        Commands::History(args) => history::execute(args, &ctx)?,
        Commands::Resolve(args) => resolve::execute(args, &ctx)?,
        Commands::Status => status::execute(&ctx)?,
        Commands::Export(args) => export::execute(args, &ctx)?,
    }

    Ok(())
}
