//! Command-line interface module
//!
//! This module handles argument parsing and output formatting.
//! It contains no orchestration logic - that belongs in [`crate::core`].

pub mod commands;
pub mod output;

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

use crate::config::defaults;
use crate::core::config::ConfigOverrides;
use crate::core::workspace::Workspace;
use crate::infra::dirs::AppDirs;
use commands::Commands;
use output::OutputConfig;

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    "\ncommit: ",
    env!("VERGEN_GIT_SHA"),
    "\ntarget: ",
    env!("VERGEN_CARGO_TARGET_TRIPLE"),
    "\nrustc: ",
    env!("VERGEN_RUSTC_SEMVER"),
);

/// sage-build - dependency-ordered package build orchestrator
///
/// Installs the packages of a distribution tree in dependency order,
/// skipping packages that are already up to date.
#[derive(Parser, Debug)]
#[command(name = "sage-build")]
#[command(author, version, long_version = LONG_VERSION, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output (-v for info, -vv for debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Output in JSON format for scripting
    #[arg(long, global = true)]
    pub json: bool,

    /// Distribution root
    #[arg(long, global = true, default_value = ".")]
    pub root: PathBuf,

    /// Manifest path, relative to the root
    #[arg(long, global = true)]
    pub manifest: Option<PathBuf>,

    /// Directory holding the global config.toml
    #[arg(long, global = true, env = defaults::ENV_CONFIG_DIR)]
    pub config_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

impl Cli {
    /// Execute the CLI command, returning the process exit code
    pub async fn run(self) -> Result<i32> {
        // Install scripts run in their own directory, so the root must be absolute
        let root = if self.root.is_absolute() {
            self.root
        } else {
            std::env::current_dir()?.join(self.root)
        };
        let context = Context {
            root,
            manifest: self.manifest,
            dirs: self
                .config_dir
                .map_or_else(AppDirs::new, AppDirs::with_config_dir),
            output: OutputConfig::new(self.quiet, self.json, self.verbose),
        };

        if let Some(cmd) = self.command {
            cmd.run(&context).await
        } else {
            // No subcommand provided, show help
            use clap::CommandFactory;
            let mut cmd = Self::command();
            cmd.print_help()?;
            Ok(0)
        }
    }
}

/// Global options shared by every command
#[derive(Debug, Clone)]
pub struct Context {
    /// Distribution root
    pub root: PathBuf,
    /// Manifest path override
    pub manifest: Option<PathBuf>,
    /// Config directory
    pub dirs: AppDirs,
    /// Output settings
    pub output: OutputConfig,
}

impl Context {
    /// Load the workspace with command-line overrides applied
    pub fn load(&self, overrides: &ConfigOverrides) -> Result<Workspace> {
        Ok(Workspace::load(
            &self.root,
            self.manifest.as_deref(),
            &self.dirs,
            overrides,
        )?)
    }
}
