//! Engine version resolution.
//!
//! Sources are consulted in order and the first one that yields a version
//! wins:
//!
//! 1. `CODEQL_VERSION` environment override
//! 2. `.codeql-version` pin file in the project root
//! 3. `codeqlVersion` field of `package.json` in the project root
//! 4. the version recorded by the last successful install in the tool home
//! 5. the latest release from the release index (cached in the tool home)
//!
//! and finally [`DEFAULT_ENGINE_VERSION`].

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use qlscan_core::{QlscanError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

use crate::client::ReleaseClient;
use crate::config::{DEFAULT_ENGINE_VERSION, INSTALL_DIR_NAME};

/// Environment variable overriding the engine version
pub const VERSION_ENV: &str = "CODEQL_VERSION";

/// Pin file name under the project root
pub const PIN_FILE: &str = ".codeql-version";

/// Version written next to an install after it validated
pub const INSTALLED_VERSION_FILE: &str = ".installed-version";

/// Cache of the latest-release lookup
pub const LATEST_CACHE_FILE: &str = "latest-release.json";

/// Default lifetime of the latest-release cache
pub const DEFAULT_LATEST_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Directories version sources read from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchDirs {
    /// Project being scanned; holds pin files and project metadata
    pub project_root: PathBuf,

    /// Engine install root; holds the install marker and lookup cache
    pub tool_home: PathBuf,
}

impl SearchDirs {
    pub fn new(project_root: impl Into<PathBuf>, tool_home: impl Into<PathBuf>) -> Self {
        Self {
            project_root: project_root.into(),
            tool_home: tool_home.into(),
        }
    }
}

/// One place a version can come from
#[async_trait]
pub trait VersionSource: Send + Sync {
    /// Short label used in logs
    fn name(&self) -> &'static str;

    /// Version from this source, `None` when the source has nothing to say
    async fn lookup(&self, dirs: &SearchDirs) -> Result<Option<String>>;
}

fn non_empty(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

async fn read_optional(path: &Path) -> Result<Option<String>> {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(QlscanError::io(path, e)),
    }
}

/// Explicit override from an environment variable
#[derive(Debug, Clone)]
pub struct EnvOverride {
    var: String,
}

impl EnvOverride {
    /// Read the given variable
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

impl Default for EnvOverride {
    fn default() -> Self {
        Self::new(VERSION_ENV)
    }
}

#[async_trait]
impl VersionSource for EnvOverride {
    fn name(&self) -> &'static str {
        "environment"
    }

    async fn lookup(&self, _dirs: &SearchDirs) -> Result<Option<String>> {
        Ok(std::env::var(&self.var).ok().as_deref().and_then(non_empty))
    }
}

/// Single-line pin file
#[derive(Debug, Clone, Copy, Default)]
pub struct PinnedFile;

#[async_trait]
impl VersionSource for PinnedFile {
    fn name(&self) -> &'static str {
        "pin file"
    }

    async fn lookup(&self, dirs: &SearchDirs) -> Result<Option<String>> {
        let content = read_optional(&dirs.project_root.join(PIN_FILE)).await?;
        Ok(content.as_deref().and_then(|c| c.lines().next()).and_then(non_empty))
    }
}

/// `codeqlVersion` in `package.json`
///
/// Unreadable or malformed metadata is ignored rather than fatal.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProjectMetadata;

#[async_trait]
impl VersionSource for ProjectMetadata {
    fn name(&self) -> &'static str {
        "project metadata"
    }

    async fn lookup(&self, dirs: &SearchDirs) -> Result<Option<String>> {
        let path = dirs.project_root.join("package.json");
        let Ok(Some(content)) = read_optional(&path).await else {
            return Ok(None);
        };
        let Ok(json) = serde_json::from_str::<serde_json::Value>(&content) else {
            debug!(path = %path.display(), "ignoring malformed package.json");
            return Ok(None);
        };
        let version = match json.get("codeqlVersion") {
            Some(serde_json::Value::String(s)) => non_empty(s),
            Some(serde_json::Value::Number(n)) => Some(n.to_string()),
            _ => None,
        };
        Ok(version)
    }
}

/// Version recorded by the last successful install
#[derive(Debug, Clone, Copy, Default)]
pub struct InstalledVersion;

#[async_trait]
impl VersionSource for InstalledVersion {
    fn name(&self) -> &'static str {
        "installed"
    }

    async fn lookup(&self, dirs: &SearchDirs) -> Result<Option<String>> {
        let path = dirs.tool_home.join(INSTALL_DIR_NAME).join(INSTALLED_VERSION_FILE);
        Ok(read_optional(&path).await?.as_deref().and_then(non_empty))
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct LatestCache {
    version: String,
    fetched_at: DateTime<Utc>,
}

/// Latest published bundle, cached in the tool home
pub struct RemoteLatest {
    client: ReleaseClient,
    ttl: Duration,
}

impl RemoteLatest {
    /// Look up through `client`, caching for [`DEFAULT_LATEST_TTL`]
    #[must_use]
    pub const fn new(client: ReleaseClient) -> Self {
        Self {
            client,
            ttl: DEFAULT_LATEST_TTL,
        }
    }

    /// Override the cache lifetime
    #[must_use]
    pub const fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    async fn cached(&self, path: &Path) -> Option<String> {
        let content = read_optional(path).await.ok()??;
        let cache: LatestCache = serde_json::from_str(&content).ok()?;
        let ttl = ChronoDuration::from_std(self.ttl).ok()?;
        (Utc::now() - cache.fetched_at < ttl).then_some(cache.version)
    }

    async fn store(path: &Path, version: &str) {
        let cache = LatestCache {
            version: version.to_string(),
            fetched_at: Utc::now(),
        };
        let written = match serde_json::to_vec_pretty(&cache) {
            Ok(bytes) => write_file(path, &bytes).await,
            Err(e) => Err(QlscanError::Json(e)),
        };
        if let Err(e) = written {
            warn!(path = %path.display(), error = %e, "could not cache latest release");
        }
    }
}

async fn write_file(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| QlscanError::io(parent, e))?;
    }
    tokio::fs::write(path, bytes)
        .await
        .map_err(|e| QlscanError::io(path, e))
}

#[async_trait]
impl VersionSource for RemoteLatest {
    fn name(&self) -> &'static str {
        "latest release"
    }

    async fn lookup(&self, dirs: &SearchDirs) -> Result<Option<String>> {
        let cache_path = dirs.tool_home.join(LATEST_CACHE_FILE);
        if let Some(version) = self.cached(&cache_path).await {
            debug!(version = %version, "using cached latest release");
            return Ok(Some(version));
        }

        let version = self.client.latest_version().await?;
        Self::store(&cache_path, &version).await;
        Ok(Some(version))
    }
}

/// Ordered chain of version sources with a fixed fallback
pub struct VersionResolver {
    sources: Vec<Box<dyn VersionSource>>,
    fallback: String,
}

impl VersionResolver {
    /// Empty chain that always resolves to `fallback`
    pub fn new(fallback: impl Into<String>) -> Self {
        Self {
            sources: Vec::new(),
            fallback: fallback.into(),
        }
    }

    /// The standard chain; the remote lookup is included when `client` is given
    #[must_use]
    pub fn standard(client: Option<ReleaseClient>) -> Self {
        let resolver = Self::new(DEFAULT_ENGINE_VERSION)
            .with_source(EnvOverride::default())
            .with_source(PinnedFile)
            .with_source(ProjectMetadata)
            .with_source(InstalledVersion);
        match client {
            Some(client) => resolver.with_source(RemoteLatest::new(client)),
            None => resolver,
        }
    }

    /// Append a source at the lowest precedence so far
    #[must_use]
    pub fn with_source(mut self, source: impl VersionSource + 'static) -> Self {
        self.sources.push(Box::new(source));
        self
    }

    /// Fallback version
    #[must_use]
    pub fn fallback(&self) -> &str {
        &self.fallback
    }

    /// Resolve strictly: the first source error aborts resolution
    pub async fn resolve(&self, dirs: &SearchDirs) -> Result<String> {
        for source in &self.sources {
            if let Some(version) = source.lookup(dirs).await? {
                debug!(source = source.name(), version = %version, "resolved engine version");
                return Ok(version);
            }
        }
        debug!(version = %self.fallback, "no version source matched, using fallback");
        Ok(self.fallback.clone())
    }

    /// Resolve, falling back to the default on a recoverable error
    pub async fn resolve_or_fallback(&self, dirs: &SearchDirs) -> Result<String> {
        match self.resolve(dirs).await {
            Err(e) if e.is_recoverable() => {
                warn!(error = %e, fallback = %self.fallback, "version lookup failed, using fallback");
                Ok(self.fallback.clone())
            }
            other => other,
        }
    }
}
