//! Command-line argument definitions using clap.

use clap::{Args, Parser, Subcommand, ValueEnum};
use qlscan::{BuildMode, FormatKind};
use std::path::PathBuf;

/// CodeQL scanner and pre-commit hook
///
/// Installs the CodeQL engine on first use, scans the project and writes a
/// markdown report plus a history log into the cache directory.
#[derive(Parser, Debug)]
#[command(name = "qscan")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Project root to scan
    #[arg(short = 'C', long = "root", global = true, default_value = ".")]
    pub root: PathBuf,

    /// Config file (defaults to qlscan.toml in the project root)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Raw engine output format
    #[arg(short, long, global = true, value_enum)]
    pub format: Option<FormatArg>,

    /// Increase verbosity
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Scan the project
    Scan(ScanArgs),

    /// Scan staged changes (for use from a pre-commit hook)
    Hook(HookArgs),

    /// Install the engine if needed and print its path
    Install,

    /// Print the engine version that would be installed
    Version,
}

#[derive(Args, Debug, Default)]
pub struct ScanArgs {
    /// Languages to analyze (comma separated)
    #[arg(short, long, value_delimiter = ',')]
    pub languages: Vec<String>,

    /// Engine worker threads
    #[arg(short, long)]
    pub threads: Option<u32>,

    /// Database build mode
    #[arg(long, value_enum)]
    pub build_mode: Option<BuildModeArg>,
}

#[derive(Args, Debug, Default)]
pub struct HookArgs {
    #[command(flatten)]
    pub scan: ScanArgs,

    /// Exit successfully even when findings are reported
    #[arg(long)]
    pub allow_findings: bool,
}

/// `--format` values
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum FormatArg {
    Sarif,
    Csv,
}

impl From<FormatArg> for FormatKind {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Sarif => Self::Sarif,
            FormatArg::Csv => Self::Csv,
        }
    }
}

/// `--build-mode` values
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum BuildModeArg {
    None,
    Autobuild,
}

impl From<BuildModeArg> for BuildMode {
    fn from(arg: BuildModeArg) -> Self {
        match arg {
            BuildModeArg::None => Self::None,
            BuildModeArg::Autobuild => Self::Autobuild,
        }
    }
}
