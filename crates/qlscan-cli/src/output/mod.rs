//! Terminal output: download progress and scan summaries.

use colored::Colorize;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use qlscan::{ProgressSink, ScanOutcome, ScanResult};
use std::io::IsTerminal;

/// Download progress bar on stderr
///
/// Hidden when stderr is not a terminal so hook output stays clean.
pub struct DownloadProgress {
    bar: ProgressBar,
}

impl DownloadProgress {
    pub fn new() -> Self {
        let bar = ProgressBar::hidden();
        if std::io::stderr().is_terminal() {
            bar.set_draw_target(ProgressDrawTarget::stderr());
        }
        Self { bar }
    }
}

impl Default for DownloadProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressSink for DownloadProgress {
    fn start(&self, total: Option<u64>) {
        let template = match total {
            Some(total) => {
                self.bar.set_length(total);
                "Downloading CodeQL {bar:40} {bytes}/{total_bytes} ({bytes_per_sec}, {eta})"
            }
            None => "Downloading CodeQL {spinner} {bytes} ({bytes_per_sec})",
        };
        if let Ok(style) = ProgressStyle::with_template(template) {
            self.bar.set_style(style.progress_chars("=> "));
        }
    }

    fn advance(&self, received: u64) {
        self.bar.set_position(received);
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

/// Print the outcome of a successful scan
pub fn print_outcome(outcome: &ScanOutcome) {
    let result = &outcome.parsed.result;
    print_result(result);

    for warning in &outcome.parsed.warnings {
        eprintln!("{} {warning}", "skipped row:".yellow());
    }
    println!(
        "{}",
        format!("Report written to {}", outcome.report_file.display()).dimmed()
    );
}

fn print_result(result: &ScanResult) {
    if result.is_clean() {
        println!("{}", "Scan finished. No issues found.".green());
        return;
    }

    println!(
        "{}",
        format!("Scan finished. {} issue(s) found.", result.total)
            .yellow()
            .bold()
    );
    for group in result.by_file() {
        println!("  {:50} {}", group.file.cyan(), group.findings.len());
    }
}
