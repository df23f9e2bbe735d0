//! Export Command

use anyhow::{Context as _, Result};
use clap::Args;
use std::path::PathBuf;

use visreg_common::store::write_atomic;

use super::Context;
use crate::output::print_success;

#[derive(Args)]
pub struct ExportArgs {
    /// Destination file; stdout when omitted
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

pub fn execute(args: ExportArgs, ctx: &Context) -> Result<()> {
    let workflow = ctx.workflow()?;
    let payload = workflow
        .embedded_payload()
        .context("Failed to build the review payload")?;

    match args.output {
        Some(path) => {
            write_atomic(&path, payload.as_bytes())
                .with_context(|| format!("Failed to write {}", path.display()))?;
            print_success(&format!("Wrote {}", path.display()));
        }
        None => println!("{}", payload),
    }
    Ok(())
}
