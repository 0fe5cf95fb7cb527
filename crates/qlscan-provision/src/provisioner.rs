//! Ensures a validated engine executable is available locally.

use qlscan_core::{
    Engine, NoProgress, ProgressSink, QlscanError, Result, ToolInstallation, ValidationFailure,
};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::client::ReleaseClient;
use crate::config::ProvisionerConfig;
use crate::extract::extract_async;
use crate::permissions;
use crate::version::{VersionResolver, INSTALLED_VERSION_FILE};

/// Name looked up on the system search path
const SYSTEM_EXECUTABLE: &str = "codeql";

/// Provisions the engine: `PATH` lookup, cached install check, or a fresh install
pub struct Provisioner {
    config: ProvisionerConfig,
    resolver: VersionResolver,
    client: ReleaseClient,
    engine: Arc<dyn Engine>,
    progress: Arc<dyn ProgressSink>,
}

impl Provisioner {
    /// Create a provisioner with the standard version resolution chain
    pub fn new(config: ProvisionerConfig, client: ReleaseClient, engine: Arc<dyn Engine>) -> Self {
        Self {
            resolver: VersionResolver::standard(Some(client.clone())),
            config,
            client,
            engine,
            progress: Arc::new(NoProgress),
        }
    }

    /// Replace the version resolution chain
    #[must_use]
    pub fn with_resolver(mut self, resolver: VersionResolver) -> Self {
        self.resolver = resolver;
        self
    }

    /// Report download progress to `progress`
    #[must_use]
    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    /// Configuration this provisioner was built with
    #[must_use]
    pub const fn config(&self) -> &ProvisionerConfig {
        &self.config
    }

    /// Version resolver in use
    #[must_use]
    pub const fn resolver(&self) -> &VersionResolver {
        &self.resolver
    }

    /// Return a usable engine, installing it if needed
    ///
    /// A second call with no intervening change performs no network I/O:
    /// either the `PATH` lookup or the cached install check answers it.
    pub async fn ensure(&self) -> Result<ToolInstallation> {
        if let Some(found) = self.from_system_path() {
            return Ok(found);
        }

        let executable = self.config.executable_path();
        if executable.exists() {
            match self.validate(&executable).await {
                Ok(install) => {
                    debug!(path = %executable.display(), version = %install.version, "cached engine is valid");
                    return Ok(install);
                }
                Err(e) => {
                    warn!(path = %executable.display(), error = %e, "cached engine failed validation, reinstalling");
                }
            }
        }

        self.install(&executable).await
    }

    /// An engine on `PATH` is trusted as found: it is not probed, so the
    /// result stays unverified with no version.
    fn from_system_path(&self) -> Option<ToolInstallation> {
        if !self.config.use_system_path {
            return None;
        }
        let path = which::which(SYSTEM_EXECUTABLE).ok()?;
        info!(path = %path.display(), "using engine from PATH");
        Some(ToolInstallation::unverified(path, self.config.platform))
    }

    /// Probe `executable`, fixing a missing execute bit once
    async fn validate(&self, executable: &Path) -> Result<ToolInstallation> {
        let unverified = ToolInstallation::unverified(executable, self.config.platform);
        match self.engine.query_version(executable).await {
            Ok(version) => Ok(unverified.into_verified(version)),
            Err(QlscanError::Validation {
                kind: ValidationFailure::PermissionDenied,
                detail,
                ..
            }) => {
                debug!(path = %executable.display(), detail = %detail, "execute permission missing, correcting");
                permissions::make_executable(executable)?;
                let version = self.engine.query_version(executable).await?;
                Ok(unverified.into_verified(version))
            }
            Err(e) => Err(e),
        }
    }

    async fn install(&self, executable: &Path) -> Result<ToolInstallation> {
        let install_dir = self.config.install_dir();
        let marker = install_dir.join(INSTALLED_VERSION_FILE);
        remove_if_present(&marker).await?;

        let version = self
            .resolver
            .resolve_or_fallback(&self.config.search_dirs())
            .await?;
        let platform = self.config.platform;
        info!(version = %version, %platform, "installing engine bundle");

        let archive = self
            .client
            .download_bundle(&version, platform, self.config.tool_home(), self.progress.as_ref())
            .await?;

        extract_async(
            archive.path().to_path_buf(),
            install_dir.clone(),
            platform.archive_format(),
        )
        .await?;
        drop(archive);

        if !executable.exists() {
            return Err(QlscanError::Validation {
                path: executable.to_path_buf(),
                kind: ValidationFailure::ExecutionFailed,
                detail: "bundle does not contain the engine executable".into(),
            });
        }
        permissions::normalize(&install_dir, executable)?;

        let install = self.validate(executable).await?;

        tokio::fs::write(&marker, format!("{version}\n"))
            .await
            .map_err(|e| QlscanError::io(&marker, e))?;
        info!(path = %executable.display(), version = %install.version, "engine installed");

        Ok(install)
    }
}

async fn remove_if_present(path: &Path) -> Result<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(QlscanError::io(path, e)),
    }
}
