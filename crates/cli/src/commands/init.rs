//! Init Command

use anyhow::{Context as _, Result};
use clap::Args;

use visreg_common::VisregConfig;

use super::Context;
use crate::output::{print_success, print_warning};

#[derive(Args)]
pub struct InitArgs {
    /// Overwrite an existing configuration file
    #[arg(long)]
    pub force: bool,
}

pub fn execute(args: InitArgs, ctx: &Context) -> Result<()> {
    if ctx.config_path.exists() && !args.force {
        print_warning(&format!(
            "{} already exists; pass --force to overwrite",
            ctx.config_path.display()
        ));
        return Ok(());
    }

    let mut config = VisregConfig::default();
    if let Some(framework) = ctx.framework {
        config.framework = framework;
    }
    config
        .save(&ctx.config_path)
        .with_context(|| format!("Failed to write {}", ctx.config_path.display()))?;

    print_success(&format!("Wrote {}", ctx.config_path.display()));
    Ok(())
}
