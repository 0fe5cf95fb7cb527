//! Engine provisioning for qlscan.
//!
//! [`Provisioner::ensure`] returns a runnable CodeQL executable:
//!
//! ```text
//! PATH lookup ──found──────────────────────────────► executable
//!     │ not found
//! cached install ──version probe ok────────────────► executable
//!     │ missing / broken
//! resolve version ─► download bundle ─► extract ─► normalize modes
//!     ─► version probe ─► record installed version ─► executable
//! ```
//!
//! The release index, version sources and archive handling are exposed
//! separately so they can be reused and tested in isolation.

mod client;
mod config;
pub mod extract;
pub mod permissions;
mod provisioner;
pub mod version;

pub use client::{parse_bundle_tag, ReleaseClient, ReleaseClientBuilder};
pub use config::*;
pub use provisioner::Provisioner;
pub use version::{
    EnvOverride, InstalledVersion, PinnedFile, ProjectMetadata, RemoteLatest, SearchDirs,
    VersionResolver, VersionSource,
};
pub use qlscan_core::{QlscanError, Result};
