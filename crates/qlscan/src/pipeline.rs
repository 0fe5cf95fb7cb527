//! End-to-end run: provision, scan, report, record.

use chrono::Utc;
use qlscan_core::{HistoryRecord, ParsedOutput, QlscanError, Result, ScanRequest, ToolInstallation};
use qlscan_provision::Provisioner;
use qlscan_scan::{report, Scanner, StateFiles};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Where a run writes its artifacts and how long each step may take
#[derive(Debug, Clone, Default)]
pub struct PipelineSettings {
    /// Markdown report destination
    pub report_file: PathBuf,

    /// History log destination
    pub history_file: PathBuf,

    /// Limit for provisioning the engine
    pub provision_timeout: Option<Duration>,

    /// Limit for database creation plus analysis
    pub scan_timeout: Option<Duration>,
}

/// What a successful run produced
#[derive(Debug, Clone)]
pub struct ScanOutcome {
    /// Engine the scan ran with
    pub installation: ToolInstallation,

    /// Findings plus any rows skipped while parsing
    pub parsed: ParsedOutput,

    /// Written report
    pub report_file: PathBuf,
}

impl ScanOutcome {
    /// Number of findings
    #[must_use]
    pub const fn total(&self) -> usize {
        self.parsed.result.total
    }
}

/// Sequential pipeline over one project
pub struct Pipeline {
    provisioner: Provisioner,
    scanner: Scanner,
    settings: PipelineSettings,
}

impl Pipeline {
    /// Create a pipeline
    pub fn new(provisioner: Provisioner, scanner: Scanner, settings: PipelineSettings) -> Self {
        Self {
            provisioner,
            scanner,
            settings,
        }
    }

    /// Settings in use
    #[must_use]
    pub const fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Ensure a usable engine, bounded by the provisioning timeout
    pub async fn provision(&self) -> Result<ToolInstallation> {
        bounded(
            "engine provisioning",
            self.settings.provision_timeout,
            self.provisioner.ensure(),
        )
        .await
    }

    /// Create and analyze the database and parse the output, bounded by the scan timeout
    pub async fn scan(&self, executable: &Path, request: &ScanRequest) -> Result<ParsedOutput> {
        bounded(
            "scan",
            self.settings.scan_timeout,
            self.scanner.run(executable, request),
        )
        .await
    }

    /// Run every step and record the outcome
    ///
    /// The ignore entry and a history row are written whether or not the run
    /// succeeded; the report only on success. A failure of the run itself
    /// takes precedence over a failure to record it.
    pub async fn run(&self, request: &ScanRequest) -> Result<ScanOutcome> {
        let outcome = self.execute(request).await;

        let record = match &outcome {
            Ok(done) => HistoryRecord::success(done.total()),
            Err(e) => HistoryRecord::failure(e.to_string()),
        };
        let state = StateFiles {
            project_root: request.source_root.clone(),
            cache_dir: request.cache_dir.clone(),
            history_file: self.settings.history_file.clone(),
        };
        let recorded = state.record(&record);

        match (outcome, recorded) {
            (Ok(done), Ok(())) => Ok(done),
            (Ok(_), Err(e)) => Err(e),
            (Err(e), recorded) => {
                if let Err(state_err) = recorded {
                    warn!(error = %state_err, "could not record failed run");
                }
                Err(e)
            }
        }
    }

    async fn execute(&self, request: &ScanRequest) -> Result<ScanOutcome> {
        let installation = self.provision().await?;
        info!(
            path = %installation.path().display(),
            version = installation.version_label(),
            "engine ready"
        );

        let parsed = self.scan(installation.path(), request).await?;
        report::write(&self.settings.report_file, &parsed.result, Utc::now())?;

        Ok(ScanOutcome {
            installation,
            parsed,
            report_file: self.settings.report_file.clone(),
        })
    }
}

/// Await `future`, failing with [`QlscanError::Timeout`] once `limit` passes
pub async fn bounded<T>(
    operation: &str,
    limit: Option<Duration>,
    future: impl Future<Output = Result<T>>,
) -> Result<T> {
    match limit {
        Some(limit) => tokio::time::timeout(limit, future)
            .await
            .map_err(|_| QlscanError::Timeout {
                operation: operation.to_string(),
                secs: limit.as_secs(),
            })?,
        None => future.await,
    }
}
