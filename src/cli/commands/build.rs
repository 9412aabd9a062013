//! Build command implementation
//!
//! Implements `sage-build build`: load the tree, plan the required packages,
//! run them through the scheduler and print the summary.

use anyhow::{Context as _, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::cli::output::{self, create_build_bar};
use crate::cli::Context;
use crate::core::config::ConfigOverrides;
use crate::core::platform::HostPlatform;
use crate::core::report::PackageStatus;
use crate::core::scheduler::{BuildEvent, BuildPlan, Scheduler};
use crate::infra::process::ScriptExecutor;

/// Build options
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    /// Packages to build
    pub targets: Vec<String>,
    /// Number of parallel jobs
    pub jobs: Option<usize>,
    /// Stop after the first failure
    pub fail_fast: bool,
    /// Continue independent branches after a failure
    pub keep_going: bool,
    /// Ignore freshness markers of the targets
    pub force: bool,
    /// Only fetch sources
    pub fetch_only: bool,
    /// Debug builds
    pub debug: bool,
    /// Install prefix
    pub prefix: Option<PathBuf>,
}

/// Execute the build command
pub async fn execute(context: &Context, options: BuildOptions) -> Result<i32> {
    let overrides = ConfigOverrides {
        prefix: options.prefix,
        jobs: options.jobs,
        fetch_only: options.fetch_only,
        debug: options.debug,
        fail_fast: options.fail_fast,
        keep_going: options.keep_going,
        force: options.force,
    };
    let workspace = context.load(&overrides)?;
    let plan = BuildPlan::new(&workspace.graph, &options.targets, workspace.config.force)?;

    let executor = ScriptExecutor::new().context("Cannot run install scripts")?;
    tracing::debug!("Using shell {}", executor.shell().display());

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted; waiting for running install actions");
            on_signal.cancel();
        }
    });

    let out = context.output;
    let bar = create_build_bar(plan.required.len() as u64, &out);
    let progress = bar.clone();
    let scheduler = Scheduler::new(&workspace.graph, &workspace.config, Arc::new(executor))
        .with_platform(Arc::new(HostPlatform))
        .with_cancellation(cancel)
        .with_events(Box::new(move |event| match event {
            BuildEvent::Started { name } => progress.set_message(name.clone()),
            BuildEvent::Finished { name, status } => {
                progress.inc(1);
                if matches!(status, PackageStatus::Failed { .. }) {
                    progress.println(format!("{} {name} failed", output::status::ERROR));
                }
            }
        }));

    let report = scheduler.run(&plan).await;
    bar.finish_and_clear();

    if out.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else if !out.quiet {
        print!("{}", report.format_summary());
        if report.success() {
            println!("{} Build complete", output::status::SUCCESS);
        } else {
            println!(
                "{} Build failed; logs are in {}",
                output::status::ERROR,
                workspace.config.logs_dir().display()
            );
        }
    }

    Ok(report.exit_code())
}
