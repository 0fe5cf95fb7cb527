use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Supported engine bundle platforms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    /// 64-bit Linux
    Linux64,
    /// 64-bit Windows
    Win64,
}

impl Platform {
    /// Platform of the running process
    #[must_use]
    pub const fn current() -> Self {
        if cfg!(windows) {
            Self::Win64
        } else {
            Self::Linux64
        }
    }

    /// Bundle name component for this platform
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Linux64 => "linux64",
            Self::Win64 => "win64",
        }
    }

    /// Archive format the bundle ships in for this platform
    #[must_use]
    pub const fn archive_format(&self) -> ArchiveFormat {
        match self {
            Self::Linux64 => ArchiveFormat::TarGz,
            Self::Win64 => ArchiveFormat::Zip,
        }
    }

    /// File name of the engine executable inside the bundle
    #[must_use]
    pub const fn executable_name(&self) -> &'static str {
        match self {
            Self::Linux64 => "codeql",
            Self::Win64 => "codeql.exe",
        }
    }

    /// Release artifact name: `codeql-bundle-<platform>.<ext>`
    #[must_use]
    pub fn bundle_name(&self) -> String {
        format!(
            "codeql-bundle-{}.{}",
            self.as_str(),
            self.archive_format().extension()
        )
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Archive container formats, selected by platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArchiveFormat {
    /// Random-access zip archive
    Zip,
    /// Gzip-compressed tar stream
    TarGz,
}

impl ArchiveFormat {
    /// File extension without the leading dot
    #[must_use]
    pub const fn extension(&self) -> &'static str {
        match self {
            Self::Zip => "zip",
            Self::TarGz => "tar.gz",
        }
    }
}

impl std::fmt::Display for ArchiveFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.extension())
    }
}

/// A locally available engine executable
///
/// `verified` is only ever set after the executable answered a version
/// query successfully.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolInstallation {
    /// Engine version (as reported or as resolved for the install)
    pub version: String,

    /// Absolute path to the engine executable
    pub executable_path: PathBuf,

    /// Platform the bundle was built for
    pub platform: Platform,

    /// Whether the executable passed its version probe
    pub verified: bool,
}

impl ToolInstallation {
    /// Record an executable that has not been probed yet
    #[must_use]
    pub fn unverified(executable_path: impl Into<PathBuf>, platform: Platform) -> Self {
        Self {
            version: String::new(),
            executable_path: executable_path.into(),
            platform,
            verified: false,
        }
    }

    /// Mark the installation as verified with the version the engine reported
    #[must_use]
    pub fn into_verified(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self.verified = true;
        self
    }

    /// Path of the executable
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.executable_path
    }

    /// Version for display; `unprobed` for an executable never queried
    #[must_use]
    pub fn version_label(&self) -> &str {
        if self.version.is_empty() {
            "unprobed"
        } else {
            &self.version
        }
    }
}
