//! Error types for sage-build
//!
//! Domain-specific error types using thiserror.

use std::path::PathBuf;
use thiserror::Error;

/// Manifest (packages.toml) errors
#[derive(Error, Debug)]
pub enum ManifestError {
    /// Manifest file missing
    #[error("Manifest not found at '{path}'")]
    NotFound { path: PathBuf },

    /// Manifest could not be read
    #[error("Failed to read manifest '{path}': {error}")]
    Read { path: PathBuf, error: String },

    /// TOML syntax or schema error
    #[error("Failed to parse manifest: {0}")]
    Parse(String),

    /// Malformed `${VAR}` placeholder
    #[error("Invalid variable substitution: {0}")]
    Substitution(String),

    /// A package declaration is missing a required value
    #[error("Package '{package}' is missing required field '{field}'")]
    MissingField { package: String, field: String },

    /// Package name contains characters outside `[a-z0-9_+.-]`
    #[error("Invalid package name '{name}': only lowercase letters, digits, '_', '+', '.' and '-' are allowed")]
    InvalidName { name: String },

    /// Source URL does not end in a usable file name
    #[error("Package '{package}' has a source URL without a file name: {url}")]
    InvalidSource { package: String, url: String },
}

/// Build graph construction errors
///
/// All of these are fatal and raised before any install action runs.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    /// Circular dependency detected
    #[error("Cyclic dependency detected: {}", cycle.join(" -> "))]
    CyclicDependency { cycle: Vec<String> },

    /// A prerequisite names a package that is not declared
    #[error("Package '{package}' depends on '{prerequisite}', which is not declared")]
    MissingPrerequisiteDeclaration {
        package: String,
        prerequisite: String,
    },

    /// The same package name is declared twice
    #[error("Package '{name}' is declared more than once")]
    DuplicatePackage { name: String },

    /// A requested target is not declared
    #[error("Unknown target '{name}'")]
    UnknownTarget { name: String },
}

/// Install action errors, recorded against a single package
#[derive(Error, Debug)]
pub enum InstallError {
    /// The install action exited with a nonzero status
    #[error("Install action for '{package}' failed with {status} (log: {log})")]
    InstallActionFailed {
        package: String,
        status: String,
        log: PathBuf,
    },

    /// The install action could not be started
    #[error("Failed to start install action for '{package}': {error}")]
    Spawn { package: String, error: String },

    /// The upstream source could not be fetched
    #[error("Failed to fetch sources for '{package}': {source}")]
    Fetch {
        package: String,
        #[source]
        source: DownloadError,
    },

    /// The action environment is invalid
    #[error("Invalid build environment for '{package}': {error}")]
    Environment { package: String, error: String },

    /// Filesystem error while preparing the action
    #[error(transparent)]
    Filesystem(#[from] FilesystemError),
}

/// Download errors
#[derive(Error, Debug)]
pub enum DownloadError {
    /// Network error
    #[error("Network error downloading '{url}': {error}")]
    NetworkError { url: String, error: String },

    /// Checksum verification failed
    #[error("Checksum mismatch for '{file}': expected {expected}, got {actual}")]
    ChecksumMismatch {
        file: String,
        expected: String,
        actual: String,
    },

    /// IO error
    #[error("IO error for '{path}': {error}")]
    IoError { path: PathBuf, error: String },

    /// Max retries exceeded
    #[error("Download failed after {retries} retries: {url}")]
    MaxRetriesExceeded { url: String, retries: u32 },

    /// URL has no usable file name
    #[error("Cannot derive a file name from '{url}'")]
    InvalidUrl { url: String },
}

/// Filesystem errors
#[derive(Error, Debug)]
pub enum FilesystemError {
    /// Failed to create directory
    #[error("Failed to create directory '{path}': {error}")]
    CreateDir { path: PathBuf, error: String },

    /// Failed to remove a file or directory
    #[error("Failed to remove '{path}': {error}")]
    Remove { path: PathBuf, error: String },

    /// Failed to write file
    #[error("Failed to write file '{path}': {error}")]
    WriteFile { path: PathBuf, error: String },

    /// Failed to read file
    #[error("Failed to read file '{path}': {error}")]
    ReadFile { path: PathBuf, error: String },
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file '{path}': {error}")]
    Read { path: PathBuf, error: String },

    /// Failed to parse config file
    #[error("Failed to parse config file '{path}': {error}")]
    Parse { path: PathBuf, error: String },

    /// Option has an invalid value
    #[error("Invalid value for '{option}': {reason}")]
    InvalidValue { option: String, reason: String },
}

/// Top-level orchestrator error type
#[derive(Error, Debug)]
pub enum OrchestratorError {
    /// Manifest error
    #[error("Manifest error: {0}")]
    Manifest(#[from] ManifestError),

    /// Graph error
    #[error("{0}")]
    Graph(#[from] GraphError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Filesystem error
    #[error("Filesystem error: {0}")]
    Filesystem(#[from] FilesystemError),
}
