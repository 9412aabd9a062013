//! sage-build - dependency-ordered package build orchestrator
//!
//! Reads the static package declarations of a distribution tree, validates
//! them into an acyclic dependency graph and installs packages in dependency
//! order with a bounded worker pool, skipping packages whose installed
//! version already matches the declaration.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`cli`] - Command-line interface parsing and output formatting
//! - [`core`] - Manifest, graph, freshness and scheduling logic
//! - [`infra`] - Infrastructure layer (network, filesystem, processes)
//! - [`config`] - Configuration and constants
//! - [`error`] - Error types and handling

pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod infra;
