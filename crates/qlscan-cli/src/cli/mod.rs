//! CLI argument parsing and command dispatch.

pub mod args;
pub mod commands;

use anyhow::Result;
use args::{Cli, Commands};
use clap::Parser;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use crate::config::Config;

/// Run the CLI application.
pub async fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    // Load configuration
    let mut config = Config::load(&cli.root, cli.config.as_deref())?;
    if let Some(format) = cli.format {
        config.output_format = format.into();
    }

    // Create context for commands
    let ctx = commands::Context::new(cli.root, config)?;

    // Dispatch to appropriate command
    match cli.command {
        Commands::Scan(args) => commands::scan::execute(ctx, args).await,
        Commands::Hook(args) => commands::hook::execute(ctx, args).await,
        Commands::Install => commands::install::execute(ctx).await,
        Commands::Version => commands::version::execute(ctx).await,
    }
}

/// Logs go to stderr; `RUST_LOG` wins over `--verbose`
fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
