//! `qscan scan` - Scan the whole project.

use anyhow::Result;
use std::process::ExitCode;

use super::Context;
use crate::cli::args::ScanArgs;
use crate::output;

pub async fn execute(ctx: Context, args: ScanArgs) -> Result<ExitCode> {
    let request = ctx.scan_request(&args);
    let outcome = ctx.pipeline()?.run(&request).await?;
    output::print_outcome(&outcome);
    Ok(ExitCode::SUCCESS)
}
