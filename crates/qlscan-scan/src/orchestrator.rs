//! Drives the engine's create and analyze phases over one source tree.

use qlscan_core::{AnalyzeOutput, Engine, ParsedOutput, QlscanError, Result, ScanRequest};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::format::ResultFormat;

/// Runs one scan: build the database, analyze it, parse the raw output
///
/// Phases run strictly in sequence. A failing phase aborts the scan and
/// nothing produced by an earlier, partial run is parsed.
#[derive(Clone)]
pub struct Scanner {
    engine: Arc<dyn Engine>,
    format: Arc<dyn ResultFormat>,
}

impl Scanner {
    /// Create a scanner driving `engine` and reading `format` output
    pub fn new(engine: Arc<dyn Engine>, format: Arc<dyn ResultFormat>) -> Self {
        Self { engine, format }
    }

    /// Output format in use
    #[must_use]
    pub fn format(&self) -> &dyn ResultFormat {
        self.format.as_ref()
    }

    /// Build the engine database for `request` and return its path
    pub async fn create_database(&self, executable: &Path, request: &ScanRequest) -> Result<PathBuf> {
        if request.languages.is_empty() {
            return Err(QlscanError::Config("no languages selected for the scan".into()));
        }
        tokio::fs::create_dir_all(request.cache_dir())
            .await
            .map_err(|e| QlscanError::io(request.cache_dir(), e))?;

        let database = request.database_path();
        info!(
            database = %database.display(),
            languages = ?request.languages,
            "creating database"
        );
        self.engine
            .create_database(executable, &database, request)
            .await?;
        Ok(database)
    }

    /// Analyze every database under `database` and return the raw output root
    ///
    /// The output root is cleared first so stale results from an earlier
    /// scan are never mixed into this one.
    pub async fn analyze(
        &self,
        executable: &Path,
        database: &Path,
        request: &ScanRequest,
    ) -> Result<PathBuf> {
        let root = self.format.output_root(request.cache_dir());
        if root.exists() {
            tokio::fs::remove_dir_all(&root)
                .await
                .map_err(|e| QlscanError::io(&root, e))?;
        }
        tokio::fs::create_dir_all(&root)
            .await
            .map_err(|e| QlscanError::io(&root, e))?;

        for (label, db) in databases(database, request) {
            let output = AnalyzeOutput {
                format: self.format.engine_format().to_string(),
                destination: self.format.destination(&root, &label),
            };
            info!(language = %label, format = self.format.name(), "analyzing database");
            self.engine.analyze(executable, &db, request, &output).await?;
        }
        Ok(root)
    }

    /// Parse the raw output under `root`
    pub fn parse(&self, root: &Path) -> Result<ParsedOutput> {
        let parsed = self.format.parse(root)?;
        if !parsed.warnings.is_empty() {
            warn!(count = parsed.warnings.len(), "malformed rows skipped while parsing results");
        }
        debug!(total = parsed.result.total, "results parsed");
        Ok(parsed)
    }

    /// Create, analyze and parse in one go
    pub async fn run(&self, executable: &Path, request: &ScanRequest) -> Result<ParsedOutput> {
        let database = self.create_database(executable, request).await?;
        let root = self.analyze(executable, &database, request).await?;
        self.parse(&root)
    }
}

/// Per-language databases under `database`
///
/// With several languages the engine builds a cluster with one database per
/// language in a subdirectory; a single language is built at `database` itself.
#[must_use]
pub fn databases(database: &Path, request: &ScanRequest) -> Vec<(String, PathBuf)> {
    if request.languages.len() > 1 {
        request
            .languages
            .iter()
            .map(|l| (l.clone(), database.join(l)))
            .collect()
    } else {
        request
            .languages
            .iter()
            .map(|l| (l.clone(), database.to_path_buf()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::FormatKind;
    use async_trait::async_trait;
    use qlscan_core::ScanPhase;
    use std::sync::Mutex;
    use tempfile::TempDir;

    const ONE_RESULT: &str = r#"{"runs": [{"results": [
        {"ruleId": "js/xss", "level": "error", "message": {"text": "XSS"},
         "locations": [{"physicalLocation": {"artifactLocation": {"uri": "a.js"}, "region": {"startLine": 2}}}]}
    ]}]}"#;

    /// Records calls and writes canned output instead of running CodeQL
    #[derive(Default)]
    struct FakeEngine {
        calls: Mutex<Vec<String>>,
        fail_create: bool,
    }

    impl FakeEngine {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Engine for FakeEngine {
        async fn query_version(&self, _executable: &Path) -> Result<String> {
            Ok("2.22.2".into())
        }

        async fn create_database(
            &self,
            _executable: &Path,
            database: &Path,
            _request: &ScanRequest,
        ) -> Result<()> {
            self.calls.lock().unwrap().push("create".into());
            if self.fail_create {
                return Err(QlscanError::Subprocess {
                    phase: ScanPhase::CreateDatabase,
                    code: Some(32),
                });
            }
            std::fs::create_dir_all(database).unwrap();
            Ok(())
        }

        async fn analyze(
            &self,
            _executable: &Path,
            database: &Path,
            _request: &ScanRequest,
            output: &AnalyzeOutput,
        ) -> Result<()> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("analyze {}", database.display()));
            let content = if output.format == "csv" {
                "rule,message\njs/xss,XSS\n"
            } else {
                ONE_RESULT
            };
            std::fs::write(&output.destination, content).unwrap();
            Ok(())
        }
    }

    fn scanner(engine: Arc<FakeEngine>, kind: FormatKind) -> Scanner {
        Scanner::new(engine, kind.strategy())
    }

    #[tokio::test]
    async fn test_run_single_language() {
        let dir = TempDir::new().unwrap();
        let engine = Arc::new(FakeEngine::default());
        let request = ScanRequest::new(dir.path(), dir.path().join("cache"), ["javascript"]);

        let parsed = scanner(engine.clone(), FormatKind::Sarif)
            .run(Path::new("codeql"), &request)
            .await
            .unwrap();

        assert_eq!(parsed.result.total, 1);
        let db = request.database_path();
        assert_eq!(
            engine.calls(),
            vec!["create".to_string(), format!("analyze {}", db.display())]
        );
        assert!(dir.path().join("cache/results/javascript.sarif").exists());
    }

    #[tokio::test]
    async fn test_cluster_analyzes_each_language() {
        let dir = TempDir::new().unwrap();
        let engine = Arc::new(FakeEngine::default());
        let request = ScanRequest::new(dir.path(), dir.path().join("cache"), ["python", "javascript"]);

        let parsed = scanner(engine.clone(), FormatKind::Csv)
            .run(Path::new("codeql"), &request)
            .await
            .unwrap();

        assert_eq!(parsed.result.total, 2);
        let calls = engine.calls();
        assert_eq!(calls.len(), 3);
        assert!(calls[1].ends_with("javascript"));
        assert!(calls[2].ends_with("python"));
    }

    #[tokio::test]
    async fn test_create_failure_stops_the_scan() {
        let dir = TempDir::new().unwrap();
        let engine = Arc::new(FakeEngine {
            fail_create: true,
            ..FakeEngine::default()
        });
        let request = ScanRequest::new(dir.path(), dir.path().join("cache"), ["javascript"]);

        let err = scanner(engine.clone(), FormatKind::Sarif)
            .run(Path::new("codeql"), &request)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            QlscanError::Subprocess {
                phase: ScanPhase::CreateDatabase,
                code: Some(32)
            }
        ));
        assert_eq!(engine.calls(), vec!["create".to_string()]);
        assert!(!dir.path().join("cache/results").exists());
    }

    #[tokio::test]
    async fn test_stale_output_is_cleared() {
        let dir = TempDir::new().unwrap();
        let engine = Arc::new(FakeEngine::default());
        let request = ScanRequest::new(dir.path(), dir.path().join("cache"), ["javascript"]);
        let stale = dir.path().join("cache/results/python.sarif");
        std::fs::create_dir_all(stale.parent().unwrap()).unwrap();
        std::fs::write(&stale, ONE_RESULT).unwrap();

        let parsed = scanner(engine, FormatKind::Sarif)
            .run(Path::new("codeql"), &request)
            .await
            .unwrap();

        assert_eq!(parsed.result.total, 1);
        assert!(!stale.exists());
    }

    #[tokio::test]
    async fn test_no_languages_is_rejected() {
        let dir = TempDir::new().unwrap();
        let engine = Arc::new(FakeEngine::default());
        let request = ScanRequest::new(dir.path(), dir.path(), Vec::<String>::new());

        let err = scanner(engine.clone(), FormatKind::Sarif)
            .create_database(Path::new("codeql"), &request)
            .await
            .unwrap_err();
        assert!(matches!(err, QlscanError::Config(_)));
        assert!(engine.calls().is_empty());
    }
}
