//! `qscan version` - Print the engine version an install would use.

use anyhow::Result;
use std::process::ExitCode;

use super::Context;

pub async fn execute(ctx: Context) -> Result<ExitCode> {
    let version = ctx.resolver()?.resolve_or_fallback(&ctx.search_dirs()).await?;
    println!("{version}");
    Ok(ExitCode::SUCCESS)
}
