//! CLI command for displaying the dependency graph
//!
//! Implements the `sage-build graph` command.

use anyhow::Result;

use crate::cli::Context;
use crate::core::config::ConfigOverrides;

/// Execute the graph command
pub fn execute(context: &Context, target: Option<&str>) -> Result<i32> {
    let workspace = context.load(&ConfigOverrides::default())?;
    let graph = &workspace.graph;

    let subset = target
        .map(|name| graph.closure(&[name.to_string()]))
        .transpose()?;
    print!("{}", graph.to_dot(subset.as_ref()));
    Ok(0)
}
