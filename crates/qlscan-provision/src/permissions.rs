//! File mode normalization for extracted bundles.

use qlscan_core::{QlscanError, Result};
use std::path::Path;

/// Make the install tree readable and its executables runnable
///
/// Directories become `0o755`. Files gain read bits for everyone. Files that
/// already carried an execute bit, and `executable` itself, become `0o755`.
/// Does nothing on non-Unix targets. Returns the number of entries changed.
#[cfg(unix)]
pub fn normalize(root: &Path, executable: &Path) -> Result<usize> {
    use std::os::unix::fs::PermissionsExt;
    use walkdir::WalkDir;

    let mut changed = 0;
    for entry in WalkDir::new(root).follow_links(false) {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(root).to_path_buf();
            QlscanError::Permission {
                path,
                reason: e.to_string(),
            }
        })?;
        if entry.path_is_symlink() {
            continue;
        }
        let meta = entry
            .metadata()
            .map_err(|e| QlscanError::Permission {
                path: entry.path().to_path_buf(),
                reason: e.to_string(),
            })?;

        let mode = meta.permissions().mode() & 0o7777;
        let wanted = if meta.is_dir() || entry.path() == executable || mode & 0o111 != 0 {
            mode | 0o755
        } else {
            mode | 0o644
        };

        if wanted != mode {
            set_mode(entry.path(), wanted)?;
            changed += 1;
        }
    }
    tracing::debug!(root = %root.display(), changed, "normalized permissions");
    Ok(changed)
}

/// Does nothing on non-Unix targets
#[cfg(not(unix))]
pub fn normalize(_root: &Path, _executable: &Path) -> Result<usize> {
    Ok(0)
}

/// Add execute bits to a single file
#[cfg(unix)]
pub fn make_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let meta = std::fs::metadata(path).map_err(|e| QlscanError::Permission {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    set_mode(path, (meta.permissions().mode() & 0o7777) | 0o755)
}

/// Does nothing on non-Unix targets
#[cfg(not(unix))]
pub fn make_executable(_path: &Path) -> Result<()> {
    Ok(())
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode)).map_err(|e| {
        QlscanError::Permission {
            path: path.to_path_buf(),
            reason: e.to_string(),
        }
    })
}
