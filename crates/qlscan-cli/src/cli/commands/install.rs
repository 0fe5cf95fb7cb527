//! `qscan install` - Provision the engine.

use anyhow::Result;
use qlscan::bounded;
use std::process::ExitCode;

use super::Context;

pub async fn execute(ctx: Context) -> Result<ExitCode> {
    let provisioner = ctx.provisioner()?;
    let installation = bounded(
        "engine provisioning",
        ctx.config.provision_timeout(),
        provisioner.ensure(),
    )
    .await?;

    println!("{}", installation.path().display());
    Ok(ExitCode::SUCCESS)
}
