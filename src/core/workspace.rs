//! Loading a distribution tree
//!
//! A [`Workspace`] ties together the resolved [`BuildConfig`] and the
//! validated [`BuildGraph`] for a distribution root. Every CLI command starts
//! here, so a malformed manifest or a cyclic graph is rejected before any
//! install action is dispatched.

use std::path::{Path, PathBuf};

use crate::config::defaults;
use crate::core::config::{BuildConfig, ConfigOverrides, GlobalConfig};
use crate::core::graph::BuildGraph;
use crate::core::manifest::Manifest;
use crate::error::OrchestratorError;
use crate::infra::dirs::AppDirs;

/// A loaded distribution tree
#[derive(Debug)]
pub struct Workspace {
    /// Manifest file the graph was built from
    pub manifest_path: PathBuf,
    /// Resolved configuration
    pub config: BuildConfig,
    /// Validated dependency graph
    pub graph: BuildGraph,
}

impl Workspace {
    /// Load the manifest under `root` and resolve configuration
    ///
    /// `manifest_path` defaults to `<root>/packages.toml`. `${SAGE_LOCAL}` in
    /// the manifest expands to the command-line prefix when one is given,
    /// then to the manifest's `[build].prefix`, otherwise to the default
    /// prefix.
    pub fn load(
        root: &Path,
        manifest_path: Option<&Path>,
        dirs: &AppDirs,
        overrides: &ConfigOverrides,
    ) -> Result<Self, OrchestratorError> {
        let manifest_path = manifest_path
            .map(|p| root.join(p))
            .unwrap_or_else(|| root.join(defaults::MANIFEST_FILE));

        let global = GlobalConfig::load_from_path(&dirs.global_config_path())?;

        let content = Manifest::read(&manifest_path)?;
        let default_prefix = root.join(defaults::DEFAULT_PREFIX);
        let prefix = match &overrides.prefix {
            Some(prefix) => root.join(prefix),
            None => {
                let vars = BuildConfig::substitution_vars(root, &default_prefix);
                Manifest::declared_prefix(&content, &vars)?
                    .map(|p| root.join(p))
                    .unwrap_or(default_prefix)
            }
        };
        let vars = BuildConfig::substitution_vars(root, &prefix);

        let manifest = Manifest::parse(&manifest_path, &content, &vars)?;
        let config = BuildConfig::resolve(root, &global, &manifest.build, overrides)?;
        let graph = BuildGraph::new(manifest.to_packages(root))?;

        tracing::info!(
            "Loaded {} packages from {}",
            graph.len(),
            manifest_path.display()
        );

        Ok(Self {
            manifest_path,
            config,
            graph,
        })
    }
}
