//! # qlscan-cli
//!
//! Command-line front end (`qscan`) for provisioning CodeQL and scanning a project.
//!
//! ## Commands
//!
//! - **scan**: full scan with markdown report and history row
//! - **hook**: pre-commit mode; skips when nothing relevant is staged, fails on findings
//! - **install**: install or validate the engine and print its path
//! - **version**: print the engine version that resolution picks

pub mod cli;
pub mod config;
pub mod output;

pub use cli::run;
