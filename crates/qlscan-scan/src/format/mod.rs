//! Output formats the analyze phase can produce, and their parsers.

pub mod sarif;
pub mod tabular;

use qlscan_core::{ParsedOutput, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Strategy for one engine output format
///
/// The orchestrator asks the format where each database's output goes and,
/// once every database was analyzed, parses the whole output root.
pub trait ResultFormat: Send + Sync {
    /// Short name (`sarif`, `csv`)
    fn name(&self) -> &'static str;

    /// Value for the engine's `--format` flag
    fn engine_format(&self) -> &'static str;

    /// Directory under the cache dir holding all raw output of one scan
    fn output_root(&self, cache_dir: &Path) -> PathBuf;

    /// Output destination for the database labelled `label`
    fn destination(&self, root: &Path, label: &str) -> PathBuf;

    /// Parse everything under `root`
    fn parse(&self, root: &Path) -> Result<ParsedOutput>;
}

/// Built-in output formats
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormatKind {
    /// SARIF v2.1.0 documents
    #[default]
    Sarif,
    /// Delimited per-query tables
    Csv,
}

impl FormatKind {
    /// Strategy object for this kind
    #[must_use]
    pub fn strategy(self) -> Arc<dyn ResultFormat> {
        match self {
            Self::Sarif => Arc::new(sarif::SarifFormat),
            Self::Csv => Arc::new(tabular::CsvFormat),
        }
    }
}

impl std::str::FromStr for FormatKind {
    type Err = qlscan_core::QlscanError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sarif" | "sarifv2.1.0" => Ok(Self::Sarif),
            "csv" => Ok(Self::Csv),
            _ => Err(qlscan_core::QlscanError::Config(format!(
                "unknown output format: {s} (valid formats: sarif, csv)"
            ))),
        }
    }
}

impl std::fmt::Display for FormatKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sarif => write!(f, "sarif"),
            Self::Csv => write!(f, "csv"),
        }
    }
}

/// Files directly inside `dir` with extension `ext`, sorted by name
///
/// A missing directory yields no files.
pub(crate) fn files_with_extension(dir: &Path, ext: &str) -> Vec<PathBuf> {
    if !dir.is_dir() {
        return Vec::new();
    }
    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(std::result::Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(walkdir::DirEntry::into_path)
        .filter(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case(ext))
        })
        .collect();
    files.sort();
    files
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_kind_parsing() {
        assert_eq!("SARIF".parse::<FormatKind>().unwrap(), FormatKind::Sarif);
        assert_eq!("csv".parse::<FormatKind>().unwrap(), FormatKind::Csv);
        assert!("xml".parse::<FormatKind>().is_err());
    }

    #[test]
    fn test_files_with_extension_filters_and_sorts() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("b.csv"), "").unwrap();
        std::fs::write(dir.path().join("a.CSV"), "").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "").unwrap();
        std::fs::create_dir(dir.path().join("nested.csv")).unwrap();

        let files = files_with_extension(dir.path(), "csv");
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.CSV", "b.csv"]);
    }

    #[test]
    fn test_missing_directory_has_no_files() {
        assert!(files_with_extension(Path::new("/nonexistent/qlscan"), "csv").is_empty());
    }
}
