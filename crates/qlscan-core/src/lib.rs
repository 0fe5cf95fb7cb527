//! Core types and traits shared by the qlscan crates.
//!
//! - **Types**: installation, scan request, findings and history records
//! - **Errors**: the [`QlscanError`] taxonomy used across provisioning and scanning
//! - **Traits**: [`Engine`] (the external analyzer) and [`ProgressSink`]
//!
//! # Example
//!
//! ```rust,ignore
//! use qlscan_core::{ScanResult, Result};
//!
//! fn summarize(result: &ScanResult) -> Result<()> {
//!     for group in result.by_file() {
//!         println!("{}: {} finding(s)", group.file, group.findings.len());
//!     }
//!     Ok(())
//! }
//! ```

mod engine;
mod error;
mod progress;
pub mod types;

pub use engine::Engine;
pub use error::{QlscanError, Result, ValidationFailure};
pub use progress::{NoProgress, ProgressSink};
pub use types::*;
