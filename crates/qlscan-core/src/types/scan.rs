use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// How the engine should obtain compiled artifacts for the database
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildMode {
    /// Extract sources without building (interpreted languages, C# build-less mode)
    #[default]
    None,
    /// Let the engine detect and run the project's build
    Autobuild,
}

impl BuildMode {
    /// Value passed to `--build-mode`
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Autobuild => "autobuild",
        }
    }
}

impl std::fmt::Display for BuildMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Parameters of one scan; not modified while the scan runs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanRequest {
    /// Root of the source tree to analyze
    pub source_root: PathBuf,

    /// Working directory for the database and raw output
    pub cache_dir: PathBuf,

    /// Engine language identifiers (`javascript`, `python`, ...)
    pub languages: BTreeSet<String>,

    /// Worker threads handed to the engine
    pub threads: u32,

    /// Build mode for database creation
    #[serde(default)]
    pub build_mode: BuildMode,

    /// Overwrite an existing database in the cache directory
    #[serde(default = "default_true")]
    pub overwrite: bool,
}

const fn default_true() -> bool {
    true
}

impl ScanRequest {
    /// Create a request with the default build mode and overwrite enabled
    pub fn new<I, S>(source_root: impl Into<PathBuf>, cache_dir: impl Into<PathBuf>, languages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            source_root: source_root.into(),
            cache_dir: cache_dir.into(),
            languages: languages.into_iter().map(Into::into).collect(),
            threads: 2,
            build_mode: BuildMode::None,
            overwrite: true,
        }
    }

    /// Set the thread count
    #[must_use]
    pub const fn threads(mut self, threads: u32) -> Self {
        self.threads = threads;
        self
    }

    /// Set the build mode
    #[must_use]
    pub const fn build_mode(mut self, mode: BuildMode) -> Self {
        self.build_mode = mode;
        self
    }

    /// Location of the engine database inside the cache directory
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.cache_dir.join("db")
    }

    /// Cache directory
    #[must_use]
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }
}

/// Engine phases driven by the orchestrator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScanPhase {
    /// `database create`
    CreateDatabase,
    /// `database analyze`
    Analyze,
}

impl ScanPhase {
    /// Subcommand label
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::CreateDatabase => "database create",
            Self::Analyze => "database analyze",
        }
    }
}

impl std::fmt::Display for ScanPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Where and how the analyze phase writes its results
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalyzeOutput {
    /// Value for the engine's `--format` flag
    pub format: String,

    /// File or directory passed as `--output`
    pub destination: PathBuf,
}
