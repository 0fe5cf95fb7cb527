//! Configuration management.
//!
//! Settings live in `qlscan.toml` at the project root. Every field is
//! optional; a missing file means defaults.

use anyhow::{Context as _, Result};
use directories::ProjectDirs;
use qlscan::{BuildMode, FormatKind, ScanRequest};
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Config file looked up in the project root
pub const CONFIG_FILE: &str = "qlscan.toml";

/// Environment variable overriding the tool home
pub const HOME_ENV: &str = "QLSCAN_HOME";

/// CLI configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Where the engine is installed (defaults to the platform cache dir)
    pub tool_home: Option<PathBuf>,

    /// Scan working directory, relative to the project root
    pub cache_dir: PathBuf,

    /// Engine languages to analyze
    pub languages: Vec<String>,

    /// Engine worker threads
    pub threads: u32,

    /// Database build mode
    pub build_mode: BuildMode,

    /// Raw output format
    pub output_format: FormatKind,

    /// Report path, relative to the cache dir
    pub report_file: PathBuf,

    /// History log path, relative to the cache dir
    pub history_file: PathBuf,

    /// Prefer a `codeql` already on `PATH`
    pub use_system_path: bool,

    /// Limit for provisioning, in seconds
    pub provision_timeout_secs: Option<u64>,

    /// Limit for database creation plus analysis, in seconds
    pub scan_timeout_secs: Option<u64>,

    /// Ask the release index for the latest version
    pub remote_lookup: bool,

    /// Lifetime of the cached latest-release answer, in seconds
    pub latest_cache_ttl_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tool_home: None,
            cache_dir: PathBuf::from(".qlscan-cache"),
            languages: vec!["javascript".into(), "python".into(), "csharp".into()],
            threads: 2,
            build_mode: BuildMode::None,
            output_format: FormatKind::Sarif,
            report_file: PathBuf::from("qlscan-report.md"),
            history_file: PathBuf::from("history.csv"),
            use_system_path: true,
            provision_timeout_secs: None,
            scan_timeout_secs: None,
            remote_lookup: true,
            latest_cache_ttl_secs: 24 * 60 * 60,
        }
    }
}

impl Config {
    /// Load configuration from `explicit`, or from `qlscan.toml` in `project_root`.
    ///
    /// An explicit path must exist; the default location may be absent.
    pub fn load(project_root: &Path, explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => {
                let path = project_root.join(CONFIG_FILE);
                if !path.exists() {
                    return Ok(Self::default());
                }
                path
            }
        };

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("could not read {}", path.display()))?;
        Self::from_toml(&content).with_context(|| format!("invalid config {}", path.display()))
    }

    /// Parse configuration text.
    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Tool home: `QLSCAN_HOME`, then `tool_home`, then the platform cache dir.
    pub fn tool_home(&self) -> Result<PathBuf> {
        resolve_tool_home(std::env::var_os(HOME_ENV), self.tool_home.as_deref())
    }

    /// Absolute cache dir for `project_root`.
    pub fn cache_dir(&self, project_root: &Path) -> PathBuf {
        project_root.join(&self.cache_dir)
    }

    /// Report path for `project_root`.
    pub fn report_file(&self, project_root: &Path) -> PathBuf {
        self.cache_dir(project_root).join(&self.report_file)
    }

    /// History log path for `project_root`.
    pub fn history_file(&self, project_root: &Path) -> PathBuf {
        self.cache_dir(project_root).join(&self.history_file)
    }

    /// Scan request for `project_root`.
    pub fn scan_request(&self, project_root: &Path) -> ScanRequest {
        ScanRequest::new(project_root, self.cache_dir(project_root), self.languages.iter().cloned())
            .threads(self.threads)
            .build_mode(self.build_mode)
    }

    pub fn provision_timeout(&self) -> Option<Duration> {
        self.provision_timeout_secs.map(Duration::from_secs)
    }

    pub fn scan_timeout(&self) -> Option<Duration> {
        self.scan_timeout_secs.map(Duration::from_secs)
    }

    pub fn latest_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.latest_cache_ttl_secs)
    }
}

fn resolve_tool_home(env: Option<OsString>, configured: Option<&Path>) -> Result<PathBuf> {
    if let Some(home) = env.filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(home));
    }
    if let Some(home) = configured {
        return Ok(home.to_path_buf());
    }
    let dirs = ProjectDirs::from("", "", "qlscan")
        .ok_or_else(|| anyhow::anyhow!("Could not determine cache directory; set {HOME_ENV}"))?;
    Ok(dirs.cache_dir().to_path_buf())
}
