//! CLI implementation for `sage-build clean` command
//!
//! Removes freshness markers so the next build reinstalls the packages.
//! Installed files under the prefix are left alone.

use anyhow::{bail, Context as _, Result};
use std::path::PathBuf;

use crate::cli::output::status;
use crate::cli::Context;
use crate::core::config::ConfigOverrides;
use crate::core::freshness::MarkerStore;

/// Execute the clean command
pub fn execute(context: &Context, packages: &[String], prefix: Option<PathBuf>) -> Result<i32> {
    let overrides = ConfigOverrides {
        prefix,
        ..ConfigOverrides::default()
    };
    let workspace = context.load(&overrides)?;
    let markers = MarkerStore::new(workspace.config.markers_dir());

    let names: Vec<String> = if packages.is_empty() {
        markers
            .list()
            .context("Failed to read freshness markers")?
            .into_keys()
            .collect()
    } else {
        for name in packages {
            if workspace.graph.index_of(name).is_none() {
                bail!("Package '{name}' is not declared in the manifest");
            }
        }
        packages.to_vec()
    };

    let mut removed = Vec::new();
    for name in &names {
        if markers
            .remove(name)
            .with_context(|| format!("Failed to remove marker for {name}"))?
        {
            removed.push(name.as_str());
        }
    }

    if context.output.json {
        println!("{}", serde_json::to_string_pretty(&removed)?);
    } else if removed.is_empty() {
        context.output.message(format!("{} Nothing to clean", status::SUCCESS));
    } else {
        context.output.message(format!(
            "{} Removed {} freshness markers:",
            status::SUCCESS,
            removed.len()
        ));
        for name in &removed {
            context.output.message(format!("  {name}"));
        }
    }

    Ok(0)
}
