//! Provision the CodeQL engine, scan a source tree and report its findings.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use qlscan::{
//!     CodeqlCli, FormatKind, Pipeline, PipelineSettings, Provisioner, ProvisionerConfig,
//!     ReleaseClient, ScanRequest, Scanner,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> qlscan::Result<()> {
//!     let engine = Arc::new(CodeqlCli::new());
//!     let provisioner = Provisioner::new(
//!         ProvisionerConfig::new("/home/me/.cache/qlscan").project_root("."),
//!         ReleaseClient::new()?,
//!         engine.clone(),
//!     );
//!     let scanner = Scanner::new(engine, FormatKind::Sarif.strategy());
//!
//!     let pipeline = Pipeline::new(provisioner, scanner, PipelineSettings {
//!         report_file: ".qlscan-cache/qlscan-report.md".into(),
//!         history_file: ".qlscan-cache/history.csv".into(),
//!         ..PipelineSettings::default()
//!     });
//!
//!     let request = ScanRequest::new(".", ".qlscan-cache", ["javascript", "python"]);
//!     let outcome = pipeline.run(&request).await?;
//!     println!("{} finding(s)", outcome.total());
//!     Ok(())
//! }
//! ```
//!
//! # Features
//!
//! - `default` - Uses rustls for TLS
//! - `rustls` - Use rustls for TLS (recommended)
//! - `native-tls` - Use system native TLS

mod pipeline;

pub use pipeline::{bounded, Pipeline, PipelineSettings, ScanOutcome};

// Re-export core types
pub use qlscan_core::*;

// Re-export provisioning
pub use qlscan_provision::{
    version, ProvisionerConfig, Provisioner, ReleaseClient, ReleaseClientBuilder, ReleaseIndex,
    RetryConfig, SearchDirs, VersionResolver, DEFAULT_ENGINE_VERSION,
};

// Re-export scanning
pub use qlscan_scan::{report, staged, state, CodeqlCli, FormatKind, ResultFormat, Scanner};

// Re-export runtime for convenience
pub use tokio;
