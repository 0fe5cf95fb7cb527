//! `qscan hook` - Scan before a commit.
//!
//! Skips the scan when no staged file belongs to a requested language and
//! fails the commit when findings are reported.

use anyhow::Result;
use colored::Colorize;
use qlscan::staged;
use std::process::ExitCode;
use tracing::info;

use super::Context;
use crate::cli::args::HookArgs;
use crate::output;

pub async fn execute(ctx: Context, args: HookArgs) -> Result<ExitCode> {
    let request = ctx.scan_request(&args.scan);

    let files = staged::staged_files(&ctx.root).await?;
    if !staged::any_relevant(&files, &request.languages) {
        info!(staged = files.len(), "no staged source files, skipping scan");
        return Ok(ExitCode::SUCCESS);
    }

    let outcome = ctx.pipeline()?.run(&request).await?;
    output::print_outcome(&outcome);

    if outcome.total() > 0 && !args.allow_findings {
        eprintln!(
            "{}",
            "Commit blocked: review the report or rerun with --allow-findings.".red()
        );
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}
