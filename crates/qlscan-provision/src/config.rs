//! Provisioning configuration types.

use qlscan_core::{Platform, QlscanError, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::version::SearchDirs;

/// Fallback engine version when no other source yields one
pub const DEFAULT_ENGINE_VERSION: &str = "2.22.2";

/// Release tag prefix used by the bundle repository
pub const BUNDLE_TAG_PREFIX: &str = "codeql-bundle-v";

/// Directory under the tool home that holds the extracted bundle
pub const INSTALL_DIR_NAME: &str = "codeql";

/// Retry configuration for failed downloads
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts
    pub max_retries: u32,

    /// Initial backoff duration
    pub initial_backoff: Duration,

    /// Maximum backoff duration
    pub max_backoff: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl RetryConfig {
    /// Create a new retry configuration
    #[must_use]
    pub const fn new() -> Self {
        Self {
            max_retries: 2,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(10),
        }
    }

    /// Disable retries entirely
    #[must_use]
    pub const fn none() -> Self {
        Self::new().max_retries(0)
    }

    /// Set maximum retries
    #[must_use]
    pub const fn max_retries(mut self, max: u32) -> Self {
        self.max_retries = max;
        self
    }

    /// Set initial backoff duration
    #[must_use]
    pub const fn initial_backoff(mut self, duration: Duration) -> Self {
        self.initial_backoff = duration;
        self
    }

    /// Calculate backoff for a given attempt
    #[must_use]
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let initial = u64::try_from(self.initial_backoff.as_millis()).unwrap_or(u64::MAX);
        let max = u64::try_from(self.max_backoff.as_millis()).unwrap_or(u64::MAX);
        let backoff = initial.saturating_mul(2u64.saturating_pow(attempt));
        Duration::from_millis(backoff.min(max))
    }
}

/// Where bundles and release metadata are fetched from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseIndex {
    /// Prefix for bundle downloads; `{tag}/{bundle}` is appended
    pub download_base: String,

    /// Endpoint answering with the latest release as JSON (`tag_name`)
    pub latest_url: String,
}

impl Default for ReleaseIndex {
    fn default() -> Self {
        Self {
            download_base: "https://github.com/github/codeql-action/releases/download".into(),
            latest_url: "https://api.github.com/repos/github/codeql-action/releases/latest".into(),
        }
    }
}

impl ReleaseIndex {
    /// Index rooted at a single base URL (mock servers, mirrors)
    ///
    /// Bundles are served from `<base>/download/...` and the latest release
    /// from `<base>/latest`.
    #[must_use]
    pub fn at(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            download_base: format!("{base}/download"),
            latest_url: format!("{base}/latest"),
        }
    }

    /// Download URL for a version and platform
    pub fn bundle_url(&self, version: &str, platform: Platform) -> Result<String> {
        let raw = format!(
            "{}/{BUNDLE_TAG_PREFIX}{version}/{}",
            self.download_base.trim_end_matches('/'),
            platform.bundle_name()
        );
        url::Url::parse(&raw)
            .map(String::from)
            .map_err(|e| QlscanError::Config(format!("invalid bundle URL {raw}: {e}")))
    }
}

/// Install location and behavior of the provisioner
///
/// Resolved once per invocation and handed to the provisioner at
/// construction; never changed while it runs.
#[derive(Debug, Clone)]
pub struct ProvisionerConfig {
    /// Root for the install, installed-version marker and lookup cache
    pub tool_home: PathBuf,

    /// Project whose pin file and `package.json` take part in version resolution
    pub project_root: PathBuf,

    /// Bundle platform
    pub platform: Platform,

    /// Return an engine found on `PATH` without touching the tool home
    pub use_system_path: bool,
}

impl ProvisionerConfig {
    /// Configuration for the current platform with `PATH` lookup enabled
    ///
    /// The project root defaults to the working directory.
    pub fn new(tool_home: impl Into<PathBuf>) -> Self {
        Self {
            tool_home: tool_home.into(),
            project_root: PathBuf::from("."),
            platform: Platform::current(),
            use_system_path: true,
        }
    }

    /// Set the project root used for version pins
    #[must_use]
    pub fn project_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.project_root = root.into();
        self
    }

    /// Override the platform
    #[must_use]
    pub const fn platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    /// Enable or disable the `PATH` short-circuit
    #[must_use]
    pub const fn use_system_path(mut self, enabled: bool) -> Self {
        self.use_system_path = enabled;
        self
    }

    /// Directory the bundle is extracted into
    #[must_use]
    pub fn install_dir(&self) -> PathBuf {
        self.tool_home.join(INSTALL_DIR_NAME)
    }

    /// Expected engine executable inside the install directory
    ///
    /// Bundles unpack to a top-level `codeql/` directory.
    #[must_use]
    pub fn executable_path(&self) -> PathBuf {
        self.install_dir()
            .join("codeql")
            .join(self.platform.executable_name())
    }

    /// Tool home
    #[must_use]
    pub fn tool_home(&self) -> &Path {
        &self.tool_home
    }

    /// Directories handed to version resolution
    #[must_use]
    pub fn search_dirs(&self) -> SearchDirs {
        SearchDirs::new(&self.project_root, &self.tool_home)
    }
}
