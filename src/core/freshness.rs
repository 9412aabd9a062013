//! Freshness markers
//!
//! After a successful install the orchestrator writes one marker file per
//! package, named after the package and containing the installed version.
//! A package is fresh when its marker holds exactly the declared version.
//! There is no hashing and no timestamp comparison.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::core::package::Package;
use crate::error::FilesystemError;
use crate::infra::filesystem;

/// Result of a freshness check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// Marker matches the declared version
    Fresh,
    /// Marker missing, unreadable, or for another version
    Stale,
}

/// On-disk marker records keyed by package name
#[derive(Debug, Clone)]
pub struct MarkerStore {
    dir: PathBuf,
}

impl MarkerStore {
    /// Create a store rooted at `dir`; nothing is created until a marker is recorded
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Marker directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Marker file for a package name
    pub fn marker_path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    /// Installed version recorded for `name`, if any
    pub fn installed_version(&self, name: &str) -> Option<String> {
        let content = std::fs::read_to_string(self.marker_path(name)).ok()?;
        let version = content.lines().next()?.trim();
        if version.is_empty() {
            None
        } else {
            Some(version.to_string())
        }
    }

    /// Compare the marker against the declared version
    pub fn check(&self, package: &Package) -> Freshness {
        match self.installed_version(package.name()) {
            Some(version) if version == package.version() => Freshness::Fresh,
            Some(version) => {
                tracing::debug!(
                    "{}: installed version {version} differs from {}",
                    package.name(),
                    package.version()
                );
                Freshness::Stale
            }
            None => Freshness::Stale,
        }
    }

    /// Record a successful install
    pub fn record(&self, package: &Package) -> Result<(), FilesystemError> {
        filesystem::write_file_atomic(
            &self.marker_path(package.name()),
            &format!("{}\n", package.version()),
        )
    }

    /// Remove the marker for `name`; returns whether one existed
    pub fn remove(&self, name: &str) -> Result<bool, FilesystemError> {
        filesystem::remove_file(&self.marker_path(name))
    }

    /// All recorded markers, name -> version
    pub fn list(&self) -> Result<BTreeMap<String, String>, FilesystemError> {
        let mut markers = BTreeMap::new();
        if !self.dir.is_dir() {
            return Ok(markers);
        }

        let entries = std::fs::read_dir(&self.dir).map_err(|e| FilesystemError::ReadFile {
            path: self.dir.clone(),
            error: e.to_string(),
        })?;
        for entry in entries.flatten() {
            if !entry.file_type().is_ok_and(|t| t.is_file()) {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(String::from) else {
                continue;
            };
            if name.starts_with('.') {
                continue;
            }
            if let Some(version) = self.installed_version(&name) {
                markers.insert(name, version);
            }
        }
        Ok(markers)
    }
}
