//! Platform-specific directory management
//!
//! Resolves the user configuration directory holding the global
//! `config.toml`. Follows the XDG Base Directory Specification on Linux and
//! standard locations on macOS.
//!
//! `SAGE_BUILD_CONFIG_DIR` overrides the platform default.

use std::env;
use std::path::{Path, PathBuf};

use crate::config::defaults;

/// Application name used in directory paths
const APP_NAME: &str = "sage-build";

/// Directory provider for sage-build
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppDirs {
    config_dir: PathBuf,
}

impl AppDirs {
    /// Resolve from the environment, then the platform default
    #[must_use]
    pub fn new() -> Self {
        Self {
            config_dir: Self::resolve_config_dir(),
        }
    }

    /// Use an explicit config directory
    #[must_use]
    pub fn with_config_dir(config_dir: impl Into<PathBuf>) -> Self {
        Self {
            config_dir: config_dir.into(),
        }
    }

    /// Get the config directory path
    ///
    /// - Linux: `$XDG_CONFIG_HOME/sage-build` or `~/.config/sage-build`
    /// - macOS: `~/Library/Application Support/sage-build`
    #[must_use]
    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// Path to the global `config.toml`
    #[must_use]
    pub fn global_config_path(&self) -> PathBuf {
        self.config_dir.join(defaults::GLOBAL_CONFIG_FILE)
    }

    fn resolve_config_dir() -> PathBuf {
        if let Ok(path) = env::var(defaults::ENV_CONFIG_DIR) {
            if !path.is_empty() {
                return PathBuf::from(path);
            }
        }

        dirs::config_dir()
            .map(|p| p.join(APP_NAME))
            .unwrap_or_else(|| {
                // Fallback to home directory
                dirs::home_dir()
                    .map(|h| h.join(".config").join(APP_NAME))
                    .unwrap_or_else(|| PathBuf::from(".").join(".config").join(APP_NAME))
            })
    }
}

impl Default for AppDirs {
    fn default() -> Self {
        Self::new()
    }
}
