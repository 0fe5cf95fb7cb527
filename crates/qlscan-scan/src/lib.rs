//! Scanning for qlscan: drive the CodeQL engine over a source tree, parse
//! its raw output into findings, and write the report and run history.
//!
//! ```text
//! ScanRequest ─► Scanner::create_database ─► Scanner::analyze ─► raw output
//!                                                                   │
//!              report::write ◄── ScanResult ◄── ResultFormat::parse ┘
//! ```
//!
//! The engine is reached only through [`qlscan_core::Engine`]; [`CodeqlCli`]
//! is the subprocess implementation.

mod engine;
pub mod format;
mod orchestrator;
pub mod report;
pub mod staged;
pub mod state;

pub use engine::{analyze_args, create_args, CodeqlCli};
pub use format::{FormatKind, ResultFormat};
pub use orchestrator::{databases, Scanner};
pub use state::{StateFiles, HISTORY_HEADER};
pub use qlscan_core::{QlscanError, Result};
