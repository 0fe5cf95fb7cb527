//! Command implementations.

pub mod hook;
pub mod install;
pub mod scan;
pub mod version;

use anyhow::Result;
use qlscan::version::{EnvOverride, InstalledVersion, PinnedFile, ProjectMetadata, RemoteLatest};
use qlscan::{
    CodeqlCli, Engine, Pipeline, PipelineSettings, Provisioner, ProvisionerConfig, ReleaseClient,
    ScanRequest, Scanner, SearchDirs, VersionResolver, DEFAULT_ENGINE_VERSION,
};
use std::path::PathBuf;
use std::sync::Arc;

use crate::cli::args::ScanArgs;
use crate::config::Config;
use crate::output::DownloadProgress;

/// Shared context for all commands.
pub struct Context {
    /// Project root
    pub root: PathBuf,

    /// Loaded configuration
    pub config: Config,

    /// Engine install root, resolved once per invocation
    pub tool_home: PathBuf,

    engine: Arc<dyn Engine>,
}

impl Context {
    pub fn new(root: PathBuf, config: Config) -> Result<Self> {
        let tool_home = config.tool_home()?;
        Ok(Self {
            root,
            config,
            tool_home,
            engine: Arc::new(CodeqlCli::new()),
        })
    }

    /// Version resolution chain honoring `remote_lookup` and the cache TTL.
    pub fn resolver(&self) -> Result<VersionResolver> {
        let resolver = VersionResolver::new(DEFAULT_ENGINE_VERSION)
            .with_source(EnvOverride::default())
            .with_source(PinnedFile)
            .with_source(ProjectMetadata)
            .with_source(InstalledVersion);
        if !self.config.remote_lookup {
            return Ok(resolver);
        }
        let client = ReleaseClient::new()?;
        Ok(resolver.with_source(RemoteLatest::new(client).ttl(self.config.latest_cache_ttl())))
    }

    /// Project pins are read from the root, install state from the tool home.
    pub fn search_dirs(&self) -> SearchDirs {
        SearchDirs::new(&self.root, &self.tool_home)
    }

    pub fn provisioner(&self) -> Result<Provisioner> {
        let config = ProvisionerConfig::new(&self.tool_home)
            .project_root(&self.root)
            .use_system_path(self.config.use_system_path);
        Ok(Provisioner::new(config, ReleaseClient::new()?, self.engine.clone())
            .with_resolver(self.resolver()?)
            .with_progress(Arc::new(DownloadProgress::new())))
    }

    pub fn pipeline(&self) -> Result<Pipeline> {
        let scanner = Scanner::new(self.engine.clone(), self.config.output_format.strategy());
        let settings = PipelineSettings {
            report_file: self.config.report_file(&self.root),
            history_file: self.config.history_file(&self.root),
            provision_timeout: self.config.provision_timeout(),
            scan_timeout: self.config.scan_timeout(),
        };
        Ok(Pipeline::new(self.provisioner()?, scanner, settings))
    }

    /// Scan request from the config, with command-line overrides applied.
    pub fn scan_request(&self, args: &ScanArgs) -> ScanRequest {
        let mut request = self.config.scan_request(&self.root);
        if !args.languages.is_empty() {
            request.languages = args.languages.iter().map(|l| l.trim().to_lowercase()).collect();
        }
        if let Some(threads) = args.threads {
            request.threads = threads;
        }
        if let Some(mode) = args.build_mode {
            request.build_mode = mode.into();
        }
        request
    }
}
