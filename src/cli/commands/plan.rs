//! Plan command implementation
//!
//! Implements `sage-build plan`: print the order a build would run packages
//! in and which of them would be skipped as up to date.

use anyhow::Result;
use serde::Serialize;
use std::path::PathBuf;

use crate::cli::output::status;
use crate::cli::Context;
use crate::core::config::ConfigOverrides;
use crate::core::freshness::{Freshness, MarkerStore};
use crate::core::scheduler::BuildPlan;

#[derive(Debug, Serialize)]
struct PlannedPackage<'a> {
    name: &'a str,
    version: &'a str,
    up_to_date: bool,
}

/// Execute the plan command
pub fn execute(
    context: &Context,
    targets: &[String],
    force: bool,
    prefix: Option<PathBuf>,
) -> Result<i32> {
    let overrides = ConfigOverrides {
        prefix,
        force,
        ..ConfigOverrides::default()
    };
    let workspace = context.load(&overrides)?;
    let graph = &workspace.graph;
    let plan = BuildPlan::new(graph, targets, force)?;
    let markers = MarkerStore::new(workspace.config.markers_dir());

    let planned: Vec<PlannedPackage<'_>> = plan
        .preview(graph, &markers)
        .into_iter()
        .map(|(index, freshness)| {
            let package = graph.package(index);
            PlannedPackage {
                name: package.name(),
                version: package.version(),
                up_to_date: freshness == Freshness::Fresh,
            }
        })
        .collect();

    if context.output.json {
        println!("{}", serde_json::to_string_pretty(&planned)?);
        return Ok(0);
    }

    let pending = planned.iter().filter(|p| !p.up_to_date).count();
    for (step, pkg) in planned.iter().enumerate() {
        let (symbol, action) = if pkg.up_to_date {
            (status::INFO, "up to date")
        } else {
            (status::WARNING, "install")
        };
        context.output.message(format!(
            "{:>3}. {symbol} {}-{} ({action})",
            step + 1,
            pkg.name,
            pkg.version
        ));
    }
    context.output.message(format!(
        "\n{pending} of {} packages would be installed",
        planned.len()
    ));

    Ok(0)
}
