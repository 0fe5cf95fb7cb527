//! Delimited (CSV) findings.
//!
//! The engine writes one table per analyzed database. Tables either carry a
//! header row naming their columns or use the engine's fixed nine-column
//! layout without a header. Rows whose column count differs from the header
//! are skipped and reported as [`ParseWarning`]s.

use csv::{ByteRecord, ReaderBuilder};
use qlscan_core::{Finding, ParseWarning, ParsedOutput, QlscanError, Result, ScanResult, Severity};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::{files_with_extension, ResultFormat};

const RULE_COLUMNS: &[&str] = &["name", "rule", "ruleid", "rule id", "query"];
const MESSAGE_COLUMNS: &[&str] = &["message", "description"];
const SEVERITY_COLUMNS: &[&str] = &["severity", "level"];
const FILE_COLUMNS: &[&str] = &["path", "file", "location"];
const LINE_COLUMNS: &[&str] = &["start line", "line", "startline"];

/// Column count of the engine's header-less layout:
/// name, description, severity, message, path, start line, start column, end line, end column
const ENGINE_LAYOUT_WIDTH: usize = 9;

/// Column positions resolved from a header (or the fixed engine layout)
#[derive(Debug, Clone, PartialEq, Eq)]
struct Columns {
    width: usize,
    rule: Option<usize>,
    message: Option<usize>,
    severity: Option<usize>,
    file: Option<usize>,
    line: Option<usize>,
}

impl Columns {
    const fn engine_layout() -> Self {
        Self {
            width: ENGINE_LAYOUT_WIDTH,
            rule: Some(0),
            message: Some(3),
            severity: Some(2),
            file: Some(4),
            line: Some(5),
        }
    }

    fn from_header(names: &[String]) -> Self {
        let find = |aliases: &[&str]| names.iter().position(|n| aliases.contains(&n.as_str()));
        Self {
            width: names.len(),
            rule: find(RULE_COLUMNS),
            message: find(MESSAGE_COLUMNS),
            severity: find(SEVERITY_COLUMNS),
            file: find(FILE_COLUMNS),
            line: find(LINE_COLUMNS),
        }
    }

    /// Whether rows carry enough to build a [`Finding`]
    const fn has_detail(&self) -> bool {
        self.rule.is_some() || self.message.is_some()
    }

    fn finding(&self, row: &[String]) -> Finding {
        let field = |idx: Option<usize>| idx.and_then(|i| row.get(i)).map(String::as_str).unwrap_or("");

        let file = field(self.file);
        Finding {
            rule_id: field(self.rule).to_string(),
            message: field(self.message).to_string(),
            severity: Severity::from_level(field(self.severity)),
            file: (!file.is_empty()).then(|| PathBuf::from(file)),
            line: field(self.line).parse().ok(),
        }
    }
}

fn clean(field: &str) -> String {
    field.trim().trim_matches('"').trim().to_string()
}

fn decode(record: &ByteRecord) -> Option<Vec<String>> {
    record
        .iter()
        .map(|field| std::str::from_utf8(field).ok().map(clean))
        .collect()
}

fn is_known_column(name: &str) -> bool {
    [RULE_COLUMNS, MESSAGE_COLUMNS, SEVERITY_COLUMNS, FILE_COLUMNS, LINE_COLUMNS]
        .iter()
        .any(|aliases| aliases.contains(&name))
}

/// A first row that is already data in the engine's fixed layout
fn looks_like_engine_row(first: &[String]) -> bool {
    first.len() == ENGINE_LAYOUT_WIDTH
        && !first.iter().any(|f| is_known_column(&f.to_lowercase()))
        && first[5].parse::<u64>().is_ok()
}

/// Parse one table
///
/// Only I/O failures are fatal; a row that is not valid UTF-8 is skipped
/// with a warning like any other malformed row.
pub fn parse_file(path: &Path) -> Result<ParsedOutput> {
    let file = std::fs::File::open(path).map_err(|e| QlscanError::io(path, e))?;
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(file);

    let mut rows: Vec<(u64, Vec<String>)> = Vec::new();
    let mut warnings = Vec::new();
    let mut record = ByteRecord::new();
    let mut read = 0u64;
    loop {
        match reader.read_byte_record(&mut record) {
            Ok(true) => {
                read += 1;
                let number = record.position().map_or(read, csv::Position::line);
                match decode(&record) {
                    Some(row) => rows.push((number, row)),
                    None => {
                        warn!(path = %path.display(), record = number, "skipping row with invalid UTF-8");
                        warnings.push(ParseWarning {
                            file: path.to_path_buf(),
                            record: number,
                            message: "row is not valid UTF-8".into(),
                        });
                    }
                }
            }
            Ok(false) => break,
            Err(e) => {
                let reason = e.to_string();
                return Err(match e.into_kind() {
                    csv::ErrorKind::Io(io) => QlscanError::io(path, io),
                    _ => QlscanError::Parse {
                        path: path.to_path_buf(),
                        reason,
                    },
                });
            }
        }
    }

    let mut rows = rows.into_iter().peekable();
    let Some((_, first)) = rows.peek() else {
        debug!(path = %path.display(), "empty table");
        return Ok(ParsedOutput {
            result: ScanResult::default(),
            warnings,
        });
    };

    let columns = if looks_like_engine_row(first) {
        Columns::engine_layout()
    } else {
        let names: Vec<String> = first.iter().map(|n| n.to_lowercase()).collect();
        rows.next();
        Columns::from_header(&names)
    };

    let mut findings = Vec::new();
    let mut count = 0usize;
    for (number, row) in rows {
        if row.len() != columns.width {
            warn!(
                path = %path.display(),
                record = number,
                expected = columns.width,
                found = row.len(),
                "skipping malformed row"
            );
            warnings.push(ParseWarning {
                file: path.to_path_buf(),
                record: number,
                message: format!("expected {} columns, found {}", columns.width, row.len()),
            });
            continue;
        }
        count += 1;
        if columns.has_detail() {
            findings.push(columns.finding(&row));
        }
    }

    let result = if columns.has_detail() {
        ScanResult::from_findings(findings)
    } else {
        debug!(path = %path.display(), rows = count, "no rule or message column, counting rows");
        ScanResult::count_only(count)
    };
    Ok(ParsedOutput { result, warnings })
}

/// Parse every `*.csv` table directly under `dir`, in file-name order
pub fn parse_dir(dir: &Path) -> Result<ParsedOutput> {
    let mut merged = ParsedOutput::default();
    for table in files_with_extension(dir, "csv") {
        let parsed = parse_file(&table)?;
        merged.result.extend(parsed.result);
        merged.warnings.extend(parsed.warnings);
    }
    Ok(merged)
}

/// CSV output: one `<label>.csv` table per database
#[derive(Debug, Clone, Copy, Default)]
pub struct CsvFormat;

impl ResultFormat for CsvFormat {
    fn name(&self) -> &'static str {
        "csv"
    }

    fn engine_format(&self) -> &'static str {
        "csv"
    }

    fn output_root(&self, cache_dir: &Path) -> PathBuf {
        cache_dir.join("csv")
    }

    fn destination(&self, root: &Path, label: &str) -> PathBuf {
        root.join(format!("{label}.csv"))
    }

    fn parse(&self, root: &Path) -> Result<ParsedOutput> {
        parse_dir(root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_two_well_formed_rows() {
        let dir = TempDir::new().unwrap();
        let path = write(
            dir.path(),
            "python.csv",
            "rule,message,severity,file,line\n\
             py/sql-injection,Query from input,error,app/db.py,12\n\
             py/flask-debug,Debug mode on,warning,app/main.py,3\n",
        );

        let parsed = parse_file(&path).unwrap();
        assert_eq!(parsed.result.total, 2);
        assert!(parsed.warnings.is_empty());

        let first = &parsed.result.findings[0];
        assert_eq!(first.rule_id, "py/sql-injection");
        assert_eq!(first.severity, Severity::Error);
        assert_eq!(first.file.as_deref(), Some(Path::new("app/db.py")));
        assert_eq!(first.line, Some(12));
    }

    #[test]
    fn test_mismatched_row_is_skipped_with_one_warning() {
        let dir = TempDir::new().unwrap();
        let path = write(
            dir.path(),
            "js.csv",
            "rule,message,severity,file,line\n\
             js/xss,Reflected,warning,web.js,4\n\
             js/broken,too,few\n\
             js/redos,Slow regex,note,re.js,9\n",
        );

        let parsed = parse_file(&path).unwrap();
        assert_eq!(parsed.result.total, 2);
        assert_eq!(parsed.warnings.len(), 1);
        assert_eq!(parsed.warnings[0].record, 3);
        assert!(parsed.result.findings.iter().all(|f| f.rule_id != "js/broken"));
    }

    #[test]
    fn test_invalid_utf8_row_is_skipped_with_one_warning() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("js.csv");
        std::fs::write(&path, b"rule,message\njs/xss,ok\njs/bad,\xff\xfe\njs/redos,ok\n").unwrap();

        let parsed = parse_file(&path).unwrap();
        assert_eq!(parsed.result.total, 2);
        assert_eq!(parsed.warnings.len(), 1);
        assert_eq!(parsed.warnings[0].record, 3);
        let rules: Vec<_> = parsed.result.findings.iter().map(|f| f.rule_id.as_str()).collect();
        assert_eq!(rules, ["js/xss", "js/redos"]);
    }

    #[test]
    fn test_invalid_utf8_table_does_not_abort_dir() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.csv"), b"rule,message\n\xff,\xfe\n").unwrap();
        write(dir.path(), "b.csv", "rule,message\npy/xss,fine\n");

        let parsed = parse_dir(dir.path()).unwrap();
        assert_eq!(parsed.result.total, 1);
        assert_eq!(parsed.warnings.len(), 1);
    }

    #[test]
    fn test_quotes_are_stripped() {
        let dir = TempDir::new().unwrap();
        let path = write(
            dir.path(),
            "q.csv",
            "\"Rule\",\"Message\",\"Severity\",\"File\",\"Line\"\n\
             \"js/xss\",\"Value, with comma\",\"Warning\",\"src/a.js\",\"7\"\n",
        );

        let parsed = parse_file(&path).unwrap();
        let finding = &parsed.result.findings[0];
        assert_eq!(finding.rule_id, "js/xss");
        assert_eq!(finding.message, "Value, with comma");
        assert_eq!(finding.severity, Severity::Warning);
        assert_eq!(finding.line, Some(7));
    }

    #[test]
    fn test_engine_layout_without_header() {
        let dir = TempDir::new().unwrap();
        let path = write(
            dir.path(),
            "csharp.csv",
            "\"Hard-coded credentials\",\"Credentials are hard-coded\",\"error\",\"Password literal\",\"/src/Auth.cs\",\"21\",\"5\",\"21\",\"30\"\n\
             \"Log injection\",\"User input in logs\",\"recommendation\",\"Unsanitized log entry\",\"/src/Log.cs\",\"8\",\"1\",\"8\",\"12\"\n",
        );

        let parsed = parse_file(&path).unwrap();
        assert_eq!(parsed.result.total, 2);
        let first = &parsed.result.findings[0];
        assert_eq!(first.rule_id, "Hard-coded credentials");
        assert_eq!(first.message, "Password literal");
        assert_eq!(first.severity, Severity::Error);
        assert_eq!(first.file.as_deref(), Some(Path::new("/src/Auth.cs")));
        assert_eq!(first.line, Some(21));
        assert_eq!(parsed.result.findings[1].severity, Severity::Note);
    }

    #[test]
    fn test_unrecognized_header_counts_rows() {
        let dir = TempDir::new().unwrap();
        let path = write(dir.path(), "odd.csv", "a,b\n1,2\n3,4\n5,6\n");

        let parsed = parse_file(&path).unwrap();
        assert_eq!(parsed.result.total, 3);
        assert!(parsed.result.findings.is_empty());
        assert!(!parsed.result.has_detail());
    }

    #[test]
    fn test_header_only_and_empty_tables() {
        let dir = TempDir::new().unwrap();
        let header_only = write(dir.path(), "h.csv", "rule,message\n");
        let empty = write(dir.path(), "e.csv", "");

        assert_eq!(parse_file(&header_only).unwrap().result.total, 0);
        assert_eq!(parse_file(&empty).unwrap().result.total, 0);
    }

    #[test]
    fn test_dir_ignores_other_files_and_merges_in_order() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "b.csv", "rule,message\nsecond,from b\n");
        write(dir.path(), "a.csv", "rule,message\nfirst,from a\n");
        write(dir.path(), "notes.txt", "rule,message\nignored,txt\n");

        let parsed = parse_dir(dir.path()).unwrap();
        assert_eq!(parsed.result.total, 2);
        assert_eq!(parsed.result.findings[0].rule_id, "first");
        assert_eq!(parsed.result.findings[1].rule_id, "second");
    }

    #[test]
    fn test_missing_root_is_empty() {
        let dir = TempDir::new().unwrap();
        let parsed = CsvFormat.parse(&dir.path().join("csv")).unwrap();
        assert_eq!(parsed.result.total, 0);
    }
}
