//! Build environment setup
//!
//! Provides the environment handed to an install action: where to install,
//! how many make jobs to use, whether to build with debugging, and the
//! platform answers. Sets `SAGE_ROOT`, `SAGE_LOCAL`, `SAGE_UPSTREAM`,
//! `PKG_NAME`, `PKG_VERSION`, `MAKEFLAGS`, `SAGE_DEBUG`,
//! `SAGE_BUILD_PLATFORM` and `SAGE_BUILD_WORD_SIZE`.

use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::core::config::BuildConfig;
use crate::core::package::Package;
use crate::core::platform::Platform;

/// Environment for one install action
#[derive(Debug, Clone, PartialEq)]
pub struct BuildEnvironment {
    /// Distribution root
    pub root: PathBuf,
    /// Install prefix
    pub prefix: PathBuf,
    /// Upstream tarball directory
    pub upstream_dir: PathBuf,
    /// Package name
    pub package_name: String,
    /// Package version
    pub package_version: String,
    /// Parallel make jobs inside the action
    pub jobs: usize,
    /// Debug build
    pub debug: bool,
    /// Target platform answer
    pub target_platform: String,
    /// Word size answer
    pub word_size: u32,
    /// Additional environment variables
    pub extra_env: BTreeMap<String, String>,
}

impl BuildEnvironment {
    /// Create the environment for `package` under `config`
    pub fn for_package(config: &BuildConfig, package: &Package, platform: &dyn Platform) -> Self {
        Self {
            root: config.root.clone(),
            prefix: config.install_prefix.clone(),
            upstream_dir: config.upstream_dir.clone(),
            package_name: package.name().to_string(),
            package_version: package.version().to_string(),
            jobs: config.jobs,
            debug: config.debug,
            target_platform: platform.target_platform(),
            word_size: platform.word_size(),
            extra_env: package.action.env.clone(),
        }
    }

    /// Set the number of parallel make jobs
    #[must_use]
    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs;
        self
    }

    /// Add an extra environment variable
    #[must_use]
    pub fn with_env(mut self, key: &str, value: &str) -> Self {
        self.extra_env.insert(key.to_string(), value.to_string());
        self
    }

    /// Convert to environment variable map for process execution
    pub fn to_env_map(&self) -> BTreeMap<String, String> {
        let mut env = BTreeMap::new();

        env.insert("SAGE_ROOT".to_string(), self.root.display().to_string());
        env.insert("SAGE_LOCAL".to_string(), self.prefix.display().to_string());
        env.insert(
            "SAGE_UPSTREAM".to_string(),
            self.upstream_dir.display().to_string(),
        );
        env.insert("PKG_NAME".to_string(), self.package_name.clone());
        env.insert("PKG_VERSION".to_string(), self.package_version.clone());
        env.insert("MAKEFLAGS".to_string(), format!("-j{}", self.jobs));
        env.insert(
            "SAGE_DEBUG".to_string(),
            if self.debug { "yes" } else { "no" }.to_string(),
        );
        env.insert(
            "SAGE_BUILD_PLATFORM".to_string(),
            self.target_platform.clone(),
        );
        env.insert(
            "SAGE_BUILD_WORD_SIZE".to_string(),
            self.word_size.to_string(),
        );

        // Package-declared variables may not shadow the ones above
        for (key, value) in &self.extra_env {
            env.entry(key.clone()).or_insert_with(|| value.clone());
        }

        env
    }

    /// Check that the environment is usable
    pub fn validate(&self) -> Result<(), BuildEnvError> {
        if self.prefix.as_os_str().is_empty() {
            return Err(BuildEnvError::MissingVariable("SAGE_LOCAL".to_string()));
        }
        if self.package_name.is_empty() {
            return Err(BuildEnvError::MissingVariable("PKG_NAME".to_string()));
        }
        if self.jobs == 0 {
            return Err(BuildEnvError::InvalidValue {
                variable: "MAKEFLAGS".to_string(),
                reason: "jobs must be greater than 0".to_string(),
            });
        }
        Ok(())
    }
}

/// Build environment errors
#[derive(Debug, Clone, PartialEq)]
pub enum BuildEnvError {
    /// Required variable is missing
    MissingVariable(String),
    /// Variable has invalid value
    InvalidValue { variable: String, reason: String },
}

impl std::fmt::Display for BuildEnvError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingVariable(var) => write!(f, "Missing required environment variable: {var}"),
            Self::InvalidValue { variable, reason } => {
                write!(f, "Invalid value for {variable}: {reason}")
            }
        }
    }
}

impl std::error::Error for BuildEnvError {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::package::{InstallAction, PackageId};
    use crate::core::platform::FixedPlatform;
    use proptest::prelude::*;

    fn sample_package() -> Package {
        let mut action = InstallAction::script("/sage/build/pkgs/r/spkg-install");
        action
            .env
            .insert("R_CONFIGURE".to_string(), "--without-x".to_string());
        Package::new(PackageId::new("r", "3.2.4"), vec![], action)
    }

    fn sample_env() -> BuildEnvironment {
        let config = BuildConfig::new("/sage").with_jobs(4).with_debug(true);
        BuildEnvironment::for_package(
            &config,
            &sample_package(),
            &FixedPlatform::new("x86_64-linux", 64),
        )
    }

    #[test]
    fn test_environment_from_config() {
        let env = sample_env();
        assert_eq!(env.prefix, PathBuf::from("/sage/local"));
        assert_eq!(env.package_name, "r");
        assert_eq!(env.package_version, "3.2.4");
        assert_eq!(env.jobs, 4);
        assert!(env.debug);
        assert_eq!(env.target_platform, "x86_64-linux");
    }

    #[test]
    fn test_env_map_contains_required_variables() {
        let map = sample_env().to_env_map();

        assert_eq!(map.get("SAGE_ROOT").unwrap(), "/sage");
        assert_eq!(map.get("SAGE_LOCAL").unwrap(), "/sage/local");
        assert_eq!(map.get("SAGE_UPSTREAM").unwrap(), "/sage/upstream");
        assert_eq!(map.get("PKG_NAME").unwrap(), "r");
        assert_eq!(map.get("PKG_VERSION").unwrap(), "3.2.4");
        assert_eq!(map.get("MAKEFLAGS").unwrap(), "-j4");
        assert_eq!(map.get("SAGE_DEBUG").unwrap(), "yes");
        assert_eq!(map.get("SAGE_BUILD_PLATFORM").unwrap(), "x86_64-linux");
        assert_eq!(map.get("SAGE_BUILD_WORD_SIZE").unwrap(), "64");
        assert_eq!(map.get("R_CONFIGURE").unwrap(), "--without-x");
    }

    #[test]
    fn test_package_env_cannot_shadow_core_variables() {
        let env = sample_env().with_env("SAGE_LOCAL", "/tmp/elsewhere");
        assert_eq!(env.to_env_map().get("SAGE_LOCAL").unwrap(), "/sage/local");
    }

    #[test]
    fn test_validation_fails_for_zero_jobs() {
        let env = sample_env().with_jobs(0);
        assert!(matches!(
            env.validate(),
            Err(BuildEnvError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_validation_fails_for_empty_prefix() {
        let mut env = sample_env();
        env.prefix = PathBuf::new();
        assert_eq!(
            env.validate(),
            Err(BuildEnvError::MissingVariable("SAGE_LOCAL".to_string()))
        );
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn prop_extra_env_preserved(
            key in "X_[A-Z_]{1,10}",
            value in "[a-zA-Z0-9_]{1,20}",
            jobs in 1usize..=32,
        ) {
            let env = sample_env().with_jobs(jobs).with_env(&key, &value);
            let map = env.to_env_map();

            prop_assert_eq!(map.get(&key).unwrap(), &value);
            prop_assert_eq!(map.get("MAKEFLAGS").unwrap(), &format!("-j{jobs}"));
            prop_assert!(env.validate().is_ok());
        }
    }
}
