//! [`Engine`] implementation backed by the CodeQL command-line tool.

use async_trait::async_trait;
use qlscan_core::{
    AnalyzeOutput, Engine, QlscanError, Result, ScanPhase, ScanRequest, ValidationFailure,
};
use std::ffi::OsString;
use std::path::Path;
use tokio::process::Command;
use tracing::{debug, info};

/// Runs `codeql` as a child process
///
/// Database creation and analysis inherit the parent's stdout/stderr so the
/// engine's progress is visible live. The child is killed if the awaiting
/// future is dropped (e.g. by a timeout).
#[derive(Debug, Clone, Copy, Default)]
pub struct CodeqlCli;

impl CodeqlCli {
    /// Create the subprocess engine
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    async fn run(&self, executable: &Path, phase: ScanPhase, args: Vec<OsString>) -> Result<()> {
        info!(phase = %phase, "running engine");
        debug!(executable = %executable.display(), ?args, "engine command line");

        let status = Command::new(executable)
            .args(&args)
            .kill_on_drop(true)
            .status()
            .await
            .map_err(|e| QlscanError::io(executable, e))?;

        if status.success() {
            Ok(())
        } else {
            Err(QlscanError::Subprocess {
                phase,
                code: status.code(),
            })
        }
    }
}

/// Arguments for `database create`
#[must_use]
pub fn create_args(database: &Path, request: &ScanRequest) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec!["database".into(), "create".into(), database.into()];
    for language in &request.languages {
        args.push(format!("--language={language}").into());
    }
    if request.languages.len() > 1 {
        args.push("--db-cluster".into());
    }
    args.push(format!("--build-mode={}", request.build_mode).into());

    let mut source_root = OsString::from("--source-root=");
    source_root.push(&request.source_root);
    args.push(source_root);

    args.push(format!("--threads={}", request.threads).into());
    if request.overwrite {
        args.push("--overwrite".into());
    }
    args
}

/// Arguments for `database analyze`
#[must_use]
pub fn analyze_args(database: &Path, request: &ScanRequest, output: &AnalyzeOutput) -> Vec<OsString> {
    let mut destination = OsString::from("--output=");
    destination.push(&output.destination);
    vec![
        "database".into(),
        "analyze".into(),
        database.into(),
        format!("--format={}", output.format).into(),
        destination,
        format!("--threads={}", request.threads).into(),
    ]
}

#[async_trait]
impl Engine for CodeqlCli {
    async fn query_version(&self, executable: &Path) -> Result<String> {
        let fail = |kind, detail: String| QlscanError::Validation {
            path: executable.to_path_buf(),
            kind,
            detail,
        };

        let output = Command::new(executable)
            .args(["version", "--format=terse"])
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                let kind = if e.kind() == std::io::ErrorKind::PermissionDenied {
                    ValidationFailure::PermissionDenied
                } else {
                    ValidationFailure::ExecutionFailed
                };
                fail(kind, e.to_string())
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let detail = match stderr.trim() {
                "" => format!("exited with {}", output.status),
                text => text.to_string(),
            };
            return Err(fail(ValidationFailure::ExecutionFailed, detail));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        stdout
            .lines()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .map(String::from)
            .ok_or_else(|| fail(ValidationFailure::ExecutionFailed, "empty version output".into()))
    }

    async fn create_database(
        &self,
        executable: &Path,
        database: &Path,
        request: &ScanRequest,
    ) -> Result<()> {
        self.run(executable, ScanPhase::CreateDatabase, create_args(database, request))
            .await
    }

    async fn analyze(
        &self,
        executable: &Path,
        database: &Path,
        request: &ScanRequest,
        output: &AnalyzeOutput,
    ) -> Result<()> {
        self.run(executable, ScanPhase::Analyze, analyze_args(database, request, output))
            .await
    }
}
