//! Build configuration
//!
//! [`BuildConfig`] is the explicit configuration object threaded through
//! graph construction, the scheduler and every install action. It is
//! assembled from four layers, later layers winning:
//!
//! 1. built-in defaults
//! 2. the global config file (`config.toml` in the user config directory)
//! 3. the manifest `[build]` table
//! 4. command-line flags

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::defaults;
use crate::core::manifest::BuildSection;
use crate::error::ConfigError;

/// What the scheduler does after an install action fails
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// Keep building branches that do not depend on the failed package
    #[default]
    KeepGoing,
    /// Stop dispatching new work; in-flight actions still run to completion
    FailFast,
}

/// Global configuration file contents
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct GlobalConfig {
    /// Default build options
    #[serde(default)]
    pub build: GlobalBuildConfig,
}

/// `[build]` table of the global config
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct GlobalBuildConfig {
    /// Default concurrency limit
    pub jobs: Option<usize>,

    /// Default failure policy
    pub keep_going: Option<bool>,

    /// Build with debugging enabled by default
    pub debug: Option<bool>,

    /// Shared upstream tarball directory
    pub upstream_dir: Option<PathBuf>,
}

impl GlobalConfig {
    /// Load from a specific path; a missing file yields the defaults
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })
    }
}

/// Values given on the command line
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    /// `--prefix`
    pub prefix: Option<PathBuf>,
    /// `--jobs`
    pub jobs: Option<usize>,
    /// `--fetch-only`
    pub fetch_only: bool,
    /// `--debug`
    pub debug: bool,
    /// `--fail-fast`
    pub fail_fast: bool,
    /// `--keep-going`
    pub keep_going: bool,
    /// `--force`
    pub force: bool,
}

/// Resolved configuration for one orchestrator run
#[derive(Debug, Clone, PartialEq)]
pub struct BuildConfig {
    /// Distribution root (holds the manifest and install scripts)
    pub root: PathBuf,
    /// Install prefix handed to every action
    pub install_prefix: PathBuf,
    /// Concurrency limit, at least 1
    pub jobs: usize,
    /// Only fetch upstream sources, do not install
    pub fetch_only: bool,
    /// Build packages with debugging enabled
    pub debug: bool,
    /// Scheduling policy after a failure
    pub failure_policy: FailurePolicy,
    /// Ignore freshness markers of the named targets
    pub force: bool,
    /// Upstream tarball directory
    pub upstream_dir: PathBuf,
}

impl BuildConfig {
    /// Defaults for a distribution rooted at `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            install_prefix: root.join(defaults::DEFAULT_PREFIX),
            upstream_dir: root.join(defaults::DEFAULT_UPSTREAM_DIR),
            root,
            jobs: num_cpus::get(),
            fetch_only: false,
            debug: false,
            failure_policy: FailurePolicy::default(),
            force: false,
        }
    }

    /// Set the concurrency limit
    #[must_use]
    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs;
        self
    }

    /// Set the install prefix
    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<PathBuf>) -> Self {
        self.install_prefix = prefix.into();
        self
    }

    /// Set the failure policy
    #[must_use]
    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// Enable or disable fetch-only mode
    #[must_use]
    pub fn with_fetch_only(mut self, fetch_only: bool) -> Self {
        self.fetch_only = fetch_only;
        self
    }

    /// Enable or disable debug builds
    #[must_use]
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Enable or disable forced rebuild of named targets
    #[must_use]
    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Layer global config, manifest `[build]` and command-line overrides
    pub fn resolve(
        root: &Path,
        global: &GlobalConfig,
        manifest: &BuildSection,
        overrides: &ConfigOverrides,
    ) -> Result<Self, ConfigError> {
        let mut config = Self::new(root);

        // Global config
        if let Some(jobs) = global.build.jobs {
            config.jobs = jobs;
        }
        if let Some(keep_going) = global.build.keep_going {
            config.failure_policy = policy_from_keep_going(keep_going);
        }
        if let Some(debug) = global.build.debug {
            config.debug = debug;
        }
        if let Some(dir) = &global.build.upstream_dir {
            config.upstream_dir = dir.clone();
        }

        // Manifest [build]
        if let Some(prefix) = &manifest.prefix {
            config.install_prefix = root.join(prefix);
        }
        if let Some(jobs) = manifest.jobs {
            config.jobs = jobs;
        }
        if let Some(keep_going) = manifest.keep_going {
            config.failure_policy = policy_from_keep_going(keep_going);
        }
        if let Some(debug) = manifest.debug {
            config.debug = debug;
        }
        if let Some(dir) = &manifest.upstream_dir {
            config.upstream_dir = root.join(dir);
        }

        // Command line
        if let Some(prefix) = &overrides.prefix {
            config.install_prefix = root.join(prefix);
        }
        if let Some(jobs) = overrides.jobs {
            config.jobs = jobs;
        }
        if overrides.fail_fast && overrides.keep_going {
            return Err(ConfigError::InvalidValue {
                option: "fail-fast".to_string(),
                reason: "cannot be combined with --keep-going".to_string(),
            });
        }
        if overrides.fail_fast {
            config.failure_policy = FailurePolicy::FailFast;
        }
        if overrides.keep_going {
            config.failure_policy = FailurePolicy::KeepGoing;
        }
        config.fetch_only |= overrides.fetch_only;
        config.debug |= overrides.debug;
        config.force |= overrides.force;

        config.validate()?;
        Ok(config)
    }

    /// Check option values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.jobs == 0 {
            return Err(ConfigError::InvalidValue {
                option: "jobs".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.install_prefix.as_os_str().is_empty() {
            return Err(ConfigError::InvalidValue {
                option: "prefix".to_string(),
                reason: "must not be empty".to_string(),
            });
        }
        Ok(())
    }

    /// Freshness marker directory
    pub fn markers_dir(&self) -> PathBuf {
        self.install_prefix.join(defaults::MARKERS_SUBDIR)
    }

    /// Build log directory
    pub fn logs_dir(&self) -> PathBuf {
        self.install_prefix.join(defaults::LOGS_SUBDIR)
    }

    /// Variables available to `${VAR}` placeholders in the manifest
    pub fn substitution_vars(root: &Path, prefix: &Path) -> BTreeMap<String, String> {
        let mut vars = BTreeMap::new();
        vars.insert("SAGE_ROOT".to_string(), root.display().to_string());
        vars.insert("SAGE_LOCAL".to_string(), prefix.display().to_string());
        vars
    }
}

fn policy_from_keep_going(keep_going: bool) -> FailurePolicy {
    if keep_going {
        FailurePolicy::KeepGoing
    } else {
        FailurePolicy::FailFast
    }
}
