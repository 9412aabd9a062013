//! Core orchestration logic
//!
//! Everything between reading the manifest and producing the build report.
//! Subprocesses, downloads and other side effects live in [`crate::infra`].
//!
//! # Submodules
//!
//! - [`manifest`] - Manifest (packages.toml) parsing and validation
//! - [`package`] - Package definitions
//! - [`graph`] - Dependency graph validation and ordering
//! - [`freshness`] - Installed-version markers
//! - [`config`] - Layered build configuration
//! - [`platform`] - Target capability queries
//! - [`build_env`] - Install action environment
//! - [`executor`] - Install action interface
//! - [`scheduler`] - Bounded dependency-ordered execution
//! - [`report`] - Run summary
//! - [`workspace`] - Loading a distribution tree

pub mod build_env;
pub mod config;
pub mod executor;
pub mod freshness;
pub mod graph;
pub mod manifest;
pub mod package;
pub mod platform;
pub mod report;
pub mod scheduler;
pub mod workspace;
