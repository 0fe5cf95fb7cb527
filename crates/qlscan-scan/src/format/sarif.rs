//! SARIF v2.1.0 findings.
//!
//! Only the fields needed for a [`Finding`] are modelled; everything else in
//! the document is ignored.

use qlscan_core::{Finding, ParsedOutput, QlscanError, Result, ScanResult, Severity};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::{files_with_extension, ResultFormat};

#[derive(Debug, Deserialize)]
struct SarifLog {
    #[serde(default)]
    runs: Vec<SarifRun>,
}

#[derive(Debug, Deserialize)]
struct SarifRun {
    #[serde(default)]
    tool: Option<SarifTool>,
    #[serde(default)]
    results: Vec<SarifResult>,
}

#[derive(Debug, Deserialize)]
struct SarifTool {
    driver: SarifDriver,
}

#[derive(Debug, Deserialize)]
struct SarifDriver {
    #[serde(default)]
    rules: Vec<SarifRule>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SarifRule {
    id: String,
    #[serde(default)]
    default_configuration: Option<SarifRuleConfig>,
}

#[derive(Debug, Deserialize)]
struct SarifRuleConfig {
    #[serde(default)]
    level: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SarifResult {
    #[serde(default)]
    rule_id: Option<String>,
    #[serde(default)]
    rule: Option<SarifRuleRef>,
    #[serde(default)]
    message: SarifMessage,
    #[serde(default)]
    level: Option<String>,
    #[serde(default)]
    locations: Vec<SarifLocation>,
}

#[derive(Debug, Deserialize)]
struct SarifRuleRef {
    #[serde(default)]
    id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct SarifMessage {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SarifLocation {
    #[serde(default)]
    physical_location: Option<SarifPhysicalLocation>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SarifPhysicalLocation {
    #[serde(default)]
    artifact_location: Option<SarifArtifactLocation>,
    #[serde(default)]
    region: Option<SarifRegion>,
}

#[derive(Debug, Deserialize)]
struct SarifArtifactLocation {
    #[serde(default)]
    uri: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SarifRegion {
    #[serde(default)]
    start_line: Option<u32>,
}

impl SarifRun {
    /// Rule id -> default level, for results that omit `level`
    fn default_levels(&self) -> HashMap<&str, &str> {
        self.tool
            .iter()
            .flat_map(|t| &t.driver.rules)
            .filter_map(|r| {
                let level = r.default_configuration.as_ref()?.level.as_deref()?;
                Some((r.id.as_str(), level))
            })
            .collect()
    }
}

impl SarifResult {
    fn into_finding(self, defaults: &HashMap<&str, &str>) -> Finding {
        let rule_id = self
            .rule_id
            .or_else(|| self.rule.and_then(|r| r.id))
            .unwrap_or_else(|| "unknown".to_string());

        let severity = self
            .level
            .as_deref()
            .or_else(|| defaults.get(rule_id.as_str()).copied())
            .map_or(Severity::Unknown, Severity::from_level);

        let physical = self
            .locations
            .into_iter()
            .next()
            .and_then(|l| l.physical_location);
        let (file, line) = physical.map_or((None, None), |p| {
            (
                p.artifact_location.and_then(|a| a.uri).map(PathBuf::from),
                p.region.and_then(|r| r.start_line),
            )
        });

        Finding {
            rule_id,
            message: self.message.text.unwrap_or_default(),
            severity,
            file,
            line,
        }
    }
}

/// Parse one SARIF document
///
/// A missing or empty document means the engine produced nothing and yields
/// an empty result. Malformed JSON is a [`QlscanError::Parse`].
pub fn parse_document(path: &Path) -> Result<ScanResult> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "no SARIF output");
            return Ok(ScanResult::default());
        }
        Err(e) => return Err(QlscanError::io(path, e)),
    };
    parse_str(&content).map_err(|reason| QlscanError::Parse {
        path: path.to_path_buf(),
        reason,
    })
}

/// Parse SARIF text, one finding per result in document order
pub fn parse_str(content: &str) -> std::result::Result<ScanResult, String> {
    if content.trim().is_empty() {
        return Ok(ScanResult::default());
    }
    let log: SarifLog = serde_json::from_str(content).map_err(|e| e.to_string())?;

    let mut findings = Vec::new();
    for mut run in log.runs {
        let results = std::mem::take(&mut run.results);
        let defaults = run.default_levels();
        findings.extend(results.into_iter().map(|r| r.into_finding(&defaults)));
    }
    Ok(ScanResult::from_findings(findings))
}

/// SARIF output: one `<label>.sarif` document per database
#[derive(Debug, Clone, Copy, Default)]
pub struct SarifFormat;

impl ResultFormat for SarifFormat {
    fn name(&self) -> &'static str {
        "sarif"
    }

    fn engine_format(&self) -> &'static str {
        "sarifv2.1.0"
    }

    fn output_root(&self, cache_dir: &Path) -> PathBuf {
        cache_dir.join("results")
    }

    fn destination(&self, root: &Path, label: &str) -> PathBuf {
        root.join(format!("{label}.sarif"))
    }

    fn parse(&self, root: &Path) -> Result<ParsedOutput> {
        let mut result = ScanResult::default();
        for document in files_with_extension(root, "sarif") {
            result.extend(parse_document(&document)?);
        }
        Ok(ParsedOutput {
            result,
            warnings: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const THREE_RESULTS: &str = r#"{
      "version": "2.1.0",
      "runs": [{
        "tool": {"driver": {"name": "CodeQL", "rules": [
          {"id": "js/sql-injection", "defaultConfiguration": {"level": "error"}}
        ]}},
        "results": [
          {"ruleId": "js/sql-injection", "message": {"text": "Query built from user input"},
           "locations": [{"physicalLocation": {"artifactLocation": {"uri": "src/db.js"}, "region": {"startLine": 14}}}]},
          {"ruleId": "js/xss", "level": "warning", "message": {"text": "Reflected XSS"},
           "locations": [{"physicalLocation": {"artifactLocation": {"uri": "src/web.js"}, "region": {"startLine": 3}}}]},
          {"ruleId": "js/sql-injection", "level": "error", "message": {"text": "Another injection"},
           "locations": [{"physicalLocation": {"artifactLocation": {"uri": "src/db.js"}, "region": {"startLine": 40}}}]}
        ]
      }]
    }"#;

    #[test]
    fn test_parse_three_results_in_order() {
        let result = parse_str(THREE_RESULTS).unwrap();
        assert_eq!(result.total, 3);
        assert_eq!(result.findings.len(), 3);

        let first = &result.findings[0];
        assert_eq!(first.rule_id, "js/sql-injection");
        assert_eq!(first.severity, Severity::Error);
        assert_eq!(first.file.as_deref(), Some(Path::new("src/db.js")));
        assert_eq!(first.line, Some(14));

        assert_eq!(result.findings[1].rule_id, "js/xss");
        assert_eq!(result.findings[2].line, Some(40));
    }

    #[test]
    fn test_groups_by_file() {
        let result = parse_str(THREE_RESULTS).unwrap();
        let groups = result.by_file();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].file, "src/db.js");
        assert_eq!(groups[0].findings.len(), 2);
        assert_eq!(groups[1].file, "src/web.js");
        assert_eq!(groups[1].findings.len(), 1);
    }

    #[test]
    fn test_results_across_runs_and_missing_location() {
        let doc = r#"{"runs": [
            {"results": [{"ruleId": "a", "message": {"text": "one"}}]},
            {"results": []},
            {"results": [{"rule": {"id": "b"}, "message": {"text": "two"}, "level": "note"}]}
        ]}"#;
        let result = parse_str(doc).unwrap();
        assert_eq!(result.total, 2);
        assert_eq!(result.findings[0].severity, Severity::Unknown);
        assert_eq!(result.findings[0].file, None);
        assert_eq!(result.findings[1].rule_id, "b");
        assert_eq!(result.findings[1].severity, Severity::Note);
    }

    #[test]
    fn test_empty_runs() {
        assert_eq!(parse_str(r#"{"runs": []}"#).unwrap().total, 0);
        assert_eq!(parse_str("").unwrap().total, 0);
    }

    #[test]
    fn test_missing_document_is_zero() {
        let dir = TempDir::new().unwrap();
        let result = parse_document(&dir.path().join("results.sarif")).unwrap();
        assert_eq!(result.total, 0);
    }

    #[test]
    fn test_malformed_document_is_parse_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("results.sarif");
        std::fs::write(&path, "{\"runs\": [").unwrap();
        let err = parse_document(&path).unwrap_err();
        assert!(matches!(err, QlscanError::Parse { .. }));
    }

    #[test]
    fn test_format_parses_every_document_under_root() {
        let dir = TempDir::new().unwrap();
        let format = SarifFormat;
        let root = format.output_root(dir.path());
        std::fs::create_dir_all(&root).unwrap();
        std::fs::write(format.destination(&root, "javascript"), THREE_RESULTS).unwrap();
        std::fs::write(
            format.destination(&root, "python"),
            r#"{"runs": [{"results": [{"ruleId": "py/flask-debug", "message": {"text": "debug"}}]}]}"#,
        )
        .unwrap();

        let parsed = format.parse(&root).unwrap();
        assert_eq!(parsed.result.total, 4);
        assert_eq!(parsed.result.findings[3].rule_id, "py/flask-debug");
        assert!(parsed.warnings.is_empty());
    }
}
