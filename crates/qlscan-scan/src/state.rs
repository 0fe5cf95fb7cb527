//! Repository state that outlives a single run: the ignore entry for the
//! cache directory and the append-only scan history.

use chrono::SecondsFormat;
use qlscan_core::{HistoryRecord, QlscanError, Result};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// First line of the history log
pub const HISTORY_HEADER: &str = "timestamp,vulnerabilities,error";

/// Ignore file maintained at the project root
pub const IGNORE_FILE: &str = ".gitignore";

/// Ignore entry for `cache_dir`, or `None` when it lies outside `project_root`
#[must_use]
pub fn ignore_entry_for(project_root: &Path, cache_dir: &Path) -> Option<String> {
    let relative = cache_dir.strip_prefix(project_root).ok()?;
    let entry = relative.to_string_lossy().replace('\\', "/");
    let entry = entry.trim_matches('/');
    if entry.is_empty() {
        return None;
    }
    Some(format!("{entry}/"))
}

/// Make sure `ignore_file` contains `entry` as its own line
///
/// Lines are compared after trimming surrounding whitespace. Returns `true`
/// when the entry had to be added.
pub fn ensure_ignore_entry(ignore_file: &Path, entry: &str) -> Result<bool> {
    let entry = entry.trim();
    let existing = match std::fs::read_to_string(ignore_file) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(e) => return Err(QlscanError::io(ignore_file, e)),
    };

    if existing.lines().any(|l| l.trim() == entry) {
        debug!(path = %ignore_file.display(), entry, "ignore entry present");
        return Ok(false);
    }

    let mut line = String::new();
    if !existing.is_empty() && !existing.ends_with('\n') {
        line.push('\n');
    }
    line.push_str(entry);
    line.push('\n');

    append(ignore_file, &line)?;
    debug!(path = %ignore_file.display(), entry, "ignore entry added");
    Ok(true)
}

/// Append one record to the history log at `path`
///
/// The header is written only when the log is missing or empty. A non-empty
/// log that does not start with the header is never rewritten: existing
/// content is kept untouched and the row is appended without a header, with
/// a warning logged.
pub fn append_history(path: &Path, record: &HistoryRecord) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| QlscanError::io(parent, e))?;
    }

    let existing = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(e) => return Err(QlscanError::io(path, e)),
    };

    let mut chunk = String::new();
    if existing.is_empty() {
        chunk.push_str(HISTORY_HEADER);
        chunk.push('\n');
    } else {
        if !existing.starts_with(HISTORY_HEADER) {
            warn!(path = %path.display(), "history log has an unexpected header, appending anyway");
        }
        if !existing.ends_with('\n') {
            chunk.push('\n');
        }
    }
    chunk.push_str(&history_row(record)?);

    append(path, &chunk)
}

fn history_row(record: &HistoryRecord) -> Result<String> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    writer
        .write_record([
            record.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
            record.issue_count.to_string(),
            record.error.clone().unwrap_or_default(),
        ])
        .map_err(|e| QlscanError::Config(format!("could not encode history row: {e}")))?;
    let bytes = writer
        .into_inner()
        .map_err(|e| QlscanError::Config(format!("could not encode history row: {e}")))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Single append write so concurrent writers never interleave inside a line
fn append(path: &Path, text: &str) -> Result<()> {
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| QlscanError::io(path, e))?;
    file.write_all(text.as_bytes())
        .map_err(|e| QlscanError::io(path, e))
}

/// Paths of the state files for a project
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateFiles {
    /// Project root holding the ignore file
    pub project_root: PathBuf,
    /// Cache directory that should be ignored
    pub cache_dir: PathBuf,
    /// History log
    pub history_file: PathBuf,
}

impl StateFiles {
    /// Record the outcome of one run
    ///
    /// The ignore entry is ensured first; the history row is appended even
    /// when that fails, and the first error is returned afterwards.
    pub fn record(&self, record: &HistoryRecord) -> Result<()> {
        let ignored = match ignore_entry_for(&self.project_root, &self.cache_dir) {
            Some(entry) => ensure_ignore_entry(&self.project_root.join(IGNORE_FILE), &entry).map(drop),
            None => {
                debug!(cache_dir = %self.cache_dir.display(), "cache dir outside project, no ignore entry");
                Ok(())
            }
        };
        let logged = append_history(&self.history_file, record);
        ignored.and(logged)
    }
}
