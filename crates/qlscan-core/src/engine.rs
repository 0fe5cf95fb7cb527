//! Capability interface for the external analysis engine.

use async_trait::async_trait;
use std::path::Path;

use crate::error::Result;
use crate::types::{AnalyzeOutput, ScanRequest};

/// Operations the pipeline needs from the engine executable
///
/// The executable path is passed on every call so a single implementation
/// can probe candidate installs as well as drive scans.
#[async_trait]
pub trait Engine: Send + Sync {
    /// Ask the executable for its version.
    ///
    /// Must fail with `QlscanError::Validation` when the executable cannot be
    /// started or exits non-zero.
    async fn query_version(&self, executable: &Path) -> Result<String>;

    /// Build a database for `request` at `database`.
    async fn create_database(
        &self,
        executable: &Path,
        database: &Path,
        request: &ScanRequest,
    ) -> Result<()>;

    /// Run the analysis queries over `database`, writing to `output`.
    async fn analyze(
        &self,
        executable: &Path,
        database: &Path,
        request: &ScanRequest,
        output: &AnalyzeOutput,
    ) -> Result<()>;
}
