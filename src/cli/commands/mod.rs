//! CLI command implementations
//!
//! Each command is implemented in its own submodule.

pub mod build;
pub mod clean;
pub mod graph;
pub mod list;
pub mod plan;

use anyhow::Result;
use clap::Subcommand;
use std::path::PathBuf;

use super::Context;

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Install packages in dependency order
    Build {
        /// Packages to build (all standard packages if none given)
        targets: Vec<String>,

        /// Number of install actions to run at once
        #[arg(short, long)]
        jobs: Option<usize>,

        /// Stop dispatching new packages after the first failure
        #[arg(long, conflicts_with = "keep_going")]
        fail_fast: bool,

        /// Keep building independent packages after a failure
        #[arg(short, long)]
        keep_going: bool,

        /// Reinstall the named targets even when up to date
        #[arg(short, long)]
        force: bool,

        /// Only download upstream sources
        #[arg(long)]
        fetch_only: bool,

        /// Build packages with debugging enabled
        #[arg(long)]
        debug: bool,

        /// Install prefix, relative to the root
        #[arg(long)]
        prefix: Option<PathBuf>,
    },

    /// Show what a build would do without running anything
    Plan {
        /// Packages to plan (all standard packages if none given)
        targets: Vec<String>,

        /// Treat the named targets as out of date
        #[arg(short, long)]
        force: bool,

        /// Install prefix, relative to the root
        #[arg(long)]
        prefix: Option<PathBuf>,
    },

    /// List declared packages and their installed versions
    List {
        /// Install prefix, relative to the root
        #[arg(long)]
        prefix: Option<PathBuf>,
    },

    /// Print the dependency graph in Graphviz DOT format
    Graph {
        /// Restrict to a package and its prerequisites
        target: Option<String>,
    },

    /// Remove freshness markers so packages are reinstalled
    Clean {
        /// Packages to forget (all if none given)
        packages: Vec<String>,

        /// Install prefix, relative to the root
        #[arg(long)]
        prefix: Option<PathBuf>,
    },
}

impl Commands {
    /// Execute the command, returning the process exit code
    pub async fn run(self, context: &Context) -> Result<i32> {
        match self {
            Self::Build {
                targets,
                jobs,
                fail_fast,
                keep_going,
                force,
                fetch_only,
                debug,
                prefix,
            } => {
                let options = build::BuildOptions {
                    targets,
                    jobs,
                    fail_fast,
                    keep_going,
                    force,
                    fetch_only,
                    debug,
                    prefix,
                };
                build::execute(context, options).await
            }
            Self::Plan {
                targets,
                force,
                prefix,
            } => plan::execute(context, &targets, force, prefix),
            Self::List { prefix } => list::execute(context, prefix),
            Self::Graph { target } => graph::execute(context, target.as_deref()),
            Self::Clean { packages, prefix } => clean::execute(context, &packages, prefix),
        }
    }
}
