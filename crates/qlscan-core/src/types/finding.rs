use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Group key for findings without a file location
pub const UNKNOWN_LOCATION: &str = "unknown location";

/// Normalized severity of a finding
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Definite problem
    Error,
    /// Likely problem
    Warning,
    /// Informational or recommendation
    Note,
    /// Missing or unrecognized level
    #[default]
    Unknown,
}

impl Severity {
    /// Map an engine level string onto a severity (case-insensitive)
    #[must_use]
    pub fn from_level(level: &str) -> Self {
        match level.trim().to_ascii_lowercase().as_str() {
            "error" => Self::Error,
            "warning" => Self::Warning,
            "note" | "recommendation" => Self::Note,
            _ => Self::Unknown,
        }
    }

    /// Lowercase label
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Note => "note",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One normalized analysis result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Finding {
    /// Rule / query identifier
    pub rule_id: String,

    /// Human readable message
    pub message: String,

    /// Normalized severity
    pub severity: Severity,

    /// Primary location file, relative to the source root when the engine reports it so
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,

    /// 1-based start line
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
}

impl Finding {
    /// Key used when grouping findings by file
    #[must_use]
    pub fn file_key(&self) -> String {
        self.file
            .as_ref()
            .map_or_else(|| UNKNOWN_LOCATION.to_string(), |p| p.display().to_string())
    }
}

/// Findings of one scan
///
/// `total == findings.len()` whenever per-finding detail was available.
/// Count-only sources (tabular output without recognizable columns) leave
/// `findings` empty and carry the authoritative count in `total`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanResult {
    /// Number of findings
    pub total: usize,

    /// Findings in source order
    pub findings: Vec<Finding>,
}

impl ScanResult {
    /// Result with full per-finding detail
    #[must_use]
    pub fn from_findings(findings: Vec<Finding>) -> Self {
        Self {
            total: findings.len(),
            findings,
        }
    }

    /// Result where only the count is known
    #[must_use]
    pub const fn count_only(total: usize) -> Self {
        Self {
            total,
            findings: Vec::new(),
        }
    }

    /// Whether the scan reported nothing
    #[must_use]
    pub const fn is_clean(&self) -> bool {
        self.total == 0
    }

    /// Whether per-finding detail is available
    #[must_use]
    pub fn has_detail(&self) -> bool {
        self.total == self.findings.len()
    }

    /// Merge another result into this one
    pub fn extend(&mut self, other: Self) {
        self.total += other.total;
        self.findings.extend(other.findings);
    }

    /// Findings grouped by file, in order of first appearance
    #[must_use]
    pub fn by_file(&self) -> Vec<FileGroup<'_>> {
        let mut groups: Vec<FileGroup<'_>> = Vec::new();
        for finding in &self.findings {
            let key = finding.file_key();
            match groups.iter_mut().find(|g| g.file == key) {
                Some(group) => group.findings.push(finding),
                None => groups.push(FileGroup {
                    file: key,
                    findings: vec![finding],
                }),
            }
        }
        groups
    }
}

/// Findings that share a file key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileGroup<'a> {
    /// File path or [`UNKNOWN_LOCATION`]
    pub file: String,

    /// Findings in that file, in source order
    pub findings: Vec<&'a Finding>,
}

/// Non-fatal problem encountered while parsing raw output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseWarning {
    /// File the problem was found in
    pub file: PathBuf,

    /// 1-based record number inside that file (header is record 1)
    pub record: u64,

    /// Description
    pub message: String,
}

impl std::fmt::Display for ParseWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}: {}", self.file.display(), self.record, self.message)
    }
}

/// Parser output: the aggregated result plus the warnings swallowed on the way
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedOutput {
    /// Aggregated findings
    pub result: ScanResult,

    /// Skipped rows and other recoverable issues
    pub warnings: Vec<ParseWarning>,
}
