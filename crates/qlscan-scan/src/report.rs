//! Markdown scan report.

use chrono::{DateTime, SecondsFormat, Utc};
use qlscan_core::{QlscanError, Result, ScanResult};
use std::fmt::Write as _;
use std::path::Path;
use tracing::info;

/// Render `result` as a markdown document
#[must_use]
pub fn render(result: &ScanResult, generated_at: DateTime<Utc>) -> String {
    let mut md = String::from("# CodeQL Scan Report\n\n");

    md.push_str("## Summary\n\n");
    let _ = writeln!(
        md,
        "- Generated: {}",
        generated_at.to_rfc3339_opts(SecondsFormat::Secs, true)
    );
    let _ = writeln!(md, "- Total findings: {}\n", result.total);

    if result.is_clean() {
        md.push_str("No issues found.\n");
        return md;
    }

    if !result.has_detail() {
        let _ = writeln!(
            md,
            "The output format did not carry per-finding detail; {} finding(s) were counted.",
            result.total
        );
        return md;
    }

    md.push_str("## Findings\n");
    for group in result.by_file() {
        let _ = writeln!(md, "\n### {} ({})\n", group.file, group.findings.len());
        md.push_str("| Rule | Description | Severity | Line |\n");
        md.push_str("|------|-------------|----------|------|\n");
        for finding in group.findings {
            let line = finding.line.map_or_else(|| "-".to_string(), |l| l.to_string());
            let _ = writeln!(
                md,
                "| {} | {} | {} | {} |",
                cell(&finding.rule_id),
                cell(&finding.message),
                finding.severity,
                line
            );
        }
    }
    md
}

/// Keep a value inside one table cell
fn cell(value: &str) -> String {
    value
        .replace('|', "\\|")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Render and write the report to `path`, creating parent directories
pub fn write(path: &Path, result: &ScanResult, generated_at: DateTime<Utc>) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| QlscanError::io(parent, e))?;
    }
    std::fs::write(path, render(result, generated_at)).map_err(|e| QlscanError::io(path, e))?;
    info!(path = %path.display(), total = result.total, "report written");
    Ok(())
}
