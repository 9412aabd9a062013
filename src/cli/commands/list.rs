//! List command implementation
//!
//! Implements `sage-build list`.

use anyhow::Result;
use serde::Serialize;
use std::path::PathBuf;

use crate::cli::output::status;
use crate::cli::Context;
use crate::core::config::ConfigOverrides;
use crate::core::freshness::MarkerStore;
use crate::core::package::PackageKind;

#[derive(Debug, Serialize)]
struct ListedPackage<'a> {
    name: &'a str,
    version: &'a str,
    kind: PackageKind,
    depends: &'a [String],
    installed: Option<String>,
}

/// Execute the list command
pub fn execute(context: &Context, prefix: Option<PathBuf>) -> Result<i32> {
    let overrides = ConfigOverrides {
        prefix,
        ..ConfigOverrides::default()
    };
    let workspace = context.load(&overrides)?;
    let markers = MarkerStore::new(workspace.config.markers_dir());

    let listed: Vec<ListedPackage<'_>> = workspace
        .graph
        .packages()
        .iter()
        .map(|pkg| ListedPackage {
            name: pkg.name(),
            version: pkg.version(),
            kind: pkg.kind,
            depends: &pkg.prerequisites,
            installed: markers.installed_version(pkg.name()),
        })
        .collect();

    if context.output.json {
        println!("{}", serde_json::to_string_pretty(&listed)?);
        return Ok(0);
    }

    let width = listed.iter().map(|p| p.name.len()).max().unwrap_or(0);
    for pkg in &listed {
        let (symbol, installed) = match &pkg.installed {
            Some(v) if v == pkg.version => (status::SUCCESS, v.clone()),
            Some(v) => (status::WARNING, format!("{v} (declared {})", pkg.version)),
            None => (" ", "not installed".to_string()),
        };
        let optional = if pkg.kind == PackageKind::Optional {
            " [optional]"
        } else {
            ""
        };
        context.output.message(format!(
            "{symbol} {:<width$}  {:<12} {installed}{optional}",
            pkg.name, pkg.version
        ));
    }

    Ok(0)
}
