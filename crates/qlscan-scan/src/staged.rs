//! Staged-file filter for hook runs.

use qlscan_core::{QlscanError, Result};
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::debug;

/// Source file extensions that belong to an engine language
#[must_use]
pub fn extensions_for(language: &str) -> &'static [&'static str] {
    match language {
        "javascript" | "typescript" => &["js", "jsx", "mjs", "cjs", "ts", "tsx"],
        "python" => &["py"],
        "csharp" => &["cs"],
        "java" => &["java"],
        "go" => &["go"],
        "ruby" => &["rb"],
        "cpp" => &["c", "cc", "cpp", "h", "hpp"],
        _ => &[],
    }
}

/// Whether `path` is source for one of `languages`
pub fn is_relevant<'a>(path: &Path, languages: impl IntoIterator<Item = &'a String>) -> bool {
    let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
        return false;
    };
    let ext = ext.to_ascii_lowercase();
    languages
        .into_iter()
        .any(|l| extensions_for(l).contains(&ext.as_str()))
}

/// Whether any of `paths` is source for one of `languages`
pub fn any_relevant<'a>(paths: &[PathBuf], languages: impl IntoIterator<Item = &'a String> + Clone) -> bool {
    paths.iter().any(|p| is_relevant(p, languages.clone()))
}

/// Files added, copied or modified in the index of the repository at `repo`
pub async fn staged_files(repo: &Path) -> Result<Vec<PathBuf>> {
    let output = Command::new("git")
        .args(["diff", "--cached", "--name-only", "--diff-filter=ACM"])
        .current_dir(repo)
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| QlscanError::Git(format!("could not run git: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(QlscanError::Git(stderr.trim().to_string()));
    }

    let files: Vec<PathBuf> = String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(PathBuf::from)
        .collect();
    debug!(count = files.len(), "staged files");
    Ok(files)
}
