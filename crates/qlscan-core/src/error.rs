use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::types::ScanPhase;

/// Result type alias for qlscan operations
pub type Result<T> = std::result::Result<T, QlscanError>;

/// Why a provisioned executable failed its version probe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationFailure {
    /// The file exists but cannot be executed by this user (missing exec bit)
    PermissionDenied,
    /// The file ran (or tried to) and failed: wrong architecture, missing libraries, non-zero exit
    ExecutionFailed,
}

impl std::fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PermissionDenied => write!(f, "permission denied"),
            Self::ExecutionFailed => write!(f, "execution failed"),
        }
    }
}

/// Errors that can occur while provisioning the engine or running a scan
#[derive(Error, Debug)]
pub enum QlscanError {
    /// Version lookup failed; callers may fall back to the default version
    #[error("could not resolve engine version: {0}")]
    VersionResolution(String),

    /// Bundle download failed
    #[error("download of {url} failed: {reason}")]
    Download {
        /// URL that was being fetched
        url: String,
        /// Transport or status failure
        reason: String,
    },

    /// Archive is corrupt, unsupported, or contains unsafe paths
    #[error("extraction of {} failed: {reason}", archive.display())]
    Extraction {
        /// Archive being extracted
        archive: PathBuf,
        /// What went wrong
        reason: String,
    },

    /// Executable bit is missing and could not be corrected
    #[error("permission error on {}: {reason}", path.display())]
    Permission {
        /// Offending file
        path: PathBuf,
        /// Underlying failure
        reason: String,
    },

    /// Executable is present but does not run
    #[error("engine at {} failed validation ({kind}): {detail}", path.display())]
    Validation {
        /// Executable that was probed
        path: PathBuf,
        /// Permission problem or execution problem
        kind: ValidationFailure,
        /// Underlying failure text
        detail: String,
    },

    /// Engine subcommand exited non-zero
    #[error("engine phase `{phase}` failed with {}", describe_exit(*code))]
    Subprocess {
        /// Phase that failed
        phase: ScanPhase,
        /// Exit code, `None` when terminated by a signal
        code: Option<i32>,
    },

    /// Structured output could not be parsed
    #[error("could not parse {}: {reason}", path.display())]
    Parse {
        /// Output document
        path: PathBuf,
        /// Parser message
        reason: String,
    },

    /// `git` could not list staged files
    #[error("git failed: {0}")]
    Git(String),

    /// A step exceeded its configured time limit
    #[error("{operation} timed out after {secs} seconds")]
    Timeout {
        /// Step that timed out
        operation: String,
        /// Limit that was exceeded
        secs: u64,
    },

    /// Filesystem error tagged with the path involved
    #[error("io error on {}: {source}", path.display())]
    Io {
        /// Path being accessed
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// JSON parsing/serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),
}

fn describe_exit(code: Option<i32>) -> String {
    code.map_or_else(|| "no exit status (terminated by signal)".to_string(), |c| format!("exit status {c}"))
}

impl QlscanError {
    /// Wrap an IO error with the path that caused it
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Build an extraction error for an archive
    pub fn extraction(archive: impl AsRef<Path>, reason: impl std::fmt::Display) -> Self {
        Self::Extraction {
            archive: archive.as_ref().to_path_buf(),
            reason: reason.to_string(),
        }
    }

    /// Returns true if the caller can continue after this error
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::VersionResolution(_) | Self::Permission { .. })
    }

    /// Name of the pipeline phase this error belongs to
    #[must_use]
    pub const fn phase(&self) -> &'static str {
        match self {
            Self::VersionResolution(_) => "version resolution",
            Self::Download { .. } => "download",
            Self::Extraction { .. } => "extraction",
            Self::Permission { .. } | Self::Validation { .. } => "validation",
            Self::Subprocess { phase, .. } => phase.as_str(),
            Self::Parse { .. } | Self::Json(_) => "result parsing",
            Self::Git(_) => "staged file listing",
            Self::Timeout { .. } => "timeout",
            Self::Io { .. } => "filesystem",
            Self::Config(_) => "configuration",
        }
    }
}
