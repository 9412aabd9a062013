//! Package data model
//!
//! A [`Package`] is an installable unit: an identity, an ordered list of
//! prerequisites and an install action. Packages are built from manifest
//! declarations when the orchestrator starts and never change during a run.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// Unique package identity
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PackageId {
    /// Package name
    pub name: String,
    /// Declared version string
    pub version: String,
}

impl PackageId {
    /// Create a new package identity
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}

impl fmt::Display for PackageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.name, self.version)
    }
}

/// Whether a package is part of the default build
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageKind {
    /// Built by `build` without explicit targets
    #[default]
    Standard,
    /// Built only when named as a target or required by one
    Optional,
}

impl fmt::Display for PackageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Standard => write!(f, "standard"),
            Self::Optional => write!(f, "optional"),
        }
    }
}

/// Upstream source tarball
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    /// Download URL
    pub url: String,
    /// Expected SHA256 checksum (hex)
    pub sha256: String,
}

impl Source {
    /// File name the tarball is stored under in the upstream directory
    ///
    /// `None` when the URL path has no usable last segment (empty, `.` or
    /// `..`), since such a name would escape the upstream directory.
    pub fn filename(&self) -> Option<String> {
        let trimmed = self.url.split(['?', '#']).next().unwrap_or(&self.url);
        let segment = trimmed.rsplit('/').find(|segment| !segment.is_empty())?;
        if matches!(segment, "." | "..") || segment.contains('\\') || segment.contains(':') {
            return None;
        }
        Some(segment.to_string())
    }
}

/// Install action: a script plus package-specific environment
///
/// Opaque to the scheduler; only the executor interprets it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallAction {
    /// Absolute path of the install script
    pub script: PathBuf,
    /// Extra environment variables for the script
    pub env: BTreeMap<String, String>,
}

impl InstallAction {
    /// Create an action running `script` with no extra environment
    pub fn script(script: impl Into<PathBuf>) -> Self {
        Self {
            script: script.into(),
            env: BTreeMap::new(),
        }
    }
}

/// An installable unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Package {
    /// Identity
    pub id: PackageId,
    /// Prerequisite package names, in declaration order
    pub prerequisites: Vec<String>,
    /// Install action
    pub action: InstallAction,
    /// Upstream source, if the package ships a tarball
    pub source: Option<Source>,
    /// Standard or optional
    pub kind: PackageKind,
}

impl Package {
    /// Create a standard package without a source
    pub fn new(id: PackageId, prerequisites: Vec<String>, action: InstallAction) -> Self {
        Self {
            id,
            prerequisites,
            action,
            source: None,
            kind: PackageKind::Standard,
        }
    }

    /// Set the upstream source
    #[must_use]
    pub fn with_source(mut self, source: Source) -> Self {
        self.source = Some(source);
        self
    }

    /// Set the package kind
    #[must_use]
    pub fn with_kind(mut self, kind: PackageKind) -> Self {
        self.kind = kind;
        self
    }

    /// Package name
    pub fn name(&self) -> &str {
        &self.id.name
    }

    /// Declared version
    pub fn version(&self) -> &str {
        &self.id.version
    }
}
