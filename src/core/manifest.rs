//! Manifest (packages.toml) parsing and validation
//!
//! The manifest declares every installable package of the distribution in
//! `[[package]]` tables. Declaration order is kept: it is the scheduler's
//! tie-break when several packages become eligible at once.
//!
//! String values may contain `${VAR}` placeholders. They are resolved from an
//! explicit variable map first (`SAGE_ROOT`, `SAGE_LOCAL`), then from the
//! process environment, and finally replaced with an empty string.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::core::package::{InstallAction, Package, PackageId, PackageKind, Source};
use crate::error::ManifestError;

/// The distribution manifest
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Manifest {
    /// Build defaults
    #[serde(default)]
    pub build: BuildSection,

    /// Package declarations, in declaration order
    #[serde(default, rename = "package")]
    pub packages: Vec<PackageDecl>,
}

/// `[build]` table: defaults overriding the global config
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BuildSection {
    /// Install prefix (relative paths are resolved against the root)
    #[serde(default)]
    pub prefix: Option<PathBuf>,

    /// Concurrency limit
    #[serde(default)]
    pub jobs: Option<usize>,

    /// Let independent branches finish after a failure
    #[serde(default)]
    pub keep_going: Option<bool>,

    /// Build packages with debugging enabled
    #[serde(default)]
    pub debug: Option<bool>,

    /// Directory for upstream tarballs
    #[serde(default)]
    pub upstream_dir: Option<PathBuf>,
}

/// A single `[[package]]` declaration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PackageDecl {
    /// Package name
    pub name: String,

    /// Package version
    pub version: String,

    /// Prerequisite package names
    #[serde(default)]
    pub depends: Vec<String>,

    /// Install script, relative to the distribution root
    #[serde(default)]
    pub install: Option<PathBuf>,

    /// Standard or optional
    #[serde(default)]
    pub kind: PackageKind,

    /// Upstream tarball
    #[serde(default)]
    pub source: Option<Source>,

    /// Extra environment for the install script
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

impl PackageDecl {
    /// Install script path, defaulting to `build/pkgs/<name>/spkg-install`
    pub fn install_script(&self, root: &Path) -> PathBuf {
        match &self.install {
            Some(path) if path.is_absolute() => path.clone(),
            Some(path) => root.join(path),
            None => root
                .join("build")
                .join("pkgs")
                .join(&self.name)
                .join("spkg-install"),
        }
    }
}

impl Manifest {
    /// Parse from TOML string without substitution
    pub fn from_toml(content: &str) -> Result<Self, ManifestError> {
        toml::from_str(content).map_err(|e| ManifestError::Parse(e.to_string()))
    }

    /// Parse from TOML string, substituting `${VAR}` placeholders first
    pub fn from_toml_with_vars(
        content: &str,
        vars: &BTreeMap<String, String>,
    ) -> Result<Self, ManifestError> {
        let mut value: toml::Value =
            toml::from_str(content).map_err(|e| ManifestError::Parse(e.to_string()))?;
        substitute_in_value(&mut value, vars)?;
        value
            .try_into()
            .map_err(|e: toml::de::Error| ManifestError::Parse(e.to_string()))
    }

    /// Read a manifest file
    pub fn read(path: &Path) -> Result<String, ManifestError> {
        if !path.exists() {
            return Err(ManifestError::NotFound {
                path: path.to_path_buf(),
            });
        }
        std::fs::read_to_string(path).map_err(|e| ManifestError::Read {
            path: path.to_path_buf(),
            error: e.to_string(),
        })
    }

    /// `[build].prefix` as written, before `${SAGE_LOCAL}` is known
    ///
    /// Placeholders in the prefix itself are expanded with `vars`.
    pub fn declared_prefix(
        content: &str,
        vars: &BTreeMap<String, String>,
    ) -> Result<Option<PathBuf>, ManifestError> {
        let value: toml::Value =
            toml::from_str(content).map_err(|e| ManifestError::Parse(e.to_string()))?;
        let Some(prefix) = value.get("build").and_then(|build| build.get("prefix")) else {
            return Ok(None);
        };
        let prefix = prefix
            .as_str()
            .ok_or_else(|| ManifestError::Parse("build.prefix must be a string".to_string()))?;
        Ok(Some(PathBuf::from(substitute_vars(prefix, vars)?)))
    }

    /// Parse, substitute and validate manifest text read from `path`
    pub fn parse(
        path: &Path,
        content: &str,
        vars: &BTreeMap<String, String>,
    ) -> Result<Self, ManifestError> {
        let manifest = Self::from_toml_with_vars(content, vars)?;
        manifest.validate()?;
        tracing::debug!(
            "Loaded manifest {} with {} packages",
            path.display(),
            manifest.packages.len()
        );
        Ok(manifest)
    }

    /// Validate declarations
    ///
    /// Duplicate names and dangling prerequisites are graph errors and are
    /// reported by [`crate::core::graph::BuildGraph::new`].
    pub fn validate(&self) -> Result<(), ManifestError> {
        for decl in &self.packages {
            if decl.name.is_empty() {
                return Err(ManifestError::MissingField {
                    package: "<unnamed>".to_string(),
                    field: "name".to_string(),
                });
            }
            if !is_valid_package_name(&decl.name) {
                return Err(ManifestError::InvalidName {
                    name: decl.name.clone(),
                });
            }
            if decl.version.trim().is_empty() {
                return Err(ManifestError::MissingField {
                    package: decl.name.clone(),
                    field: "version".to_string(),
                });
            }
            if let Some(source) = &decl.source {
                if source.filename().is_none() {
                    return Err(ManifestError::InvalidSource {
                        package: decl.name.clone(),
                        url: source.url.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Convert declarations into packages, resolving script paths against `root`
    pub fn to_packages(&self, root: &Path) -> Vec<Package> {
        self.packages
            .iter()
            .map(|decl| Package {
                id: PackageId::new(&decl.name, decl.version.trim()),
                prerequisites: decl.depends.clone(),
                action: InstallAction {
                    script: decl.install_script(root),
                    env: decl.env.clone(),
                },
                source: decl.source.clone(),
                kind: decl.kind,
            })
            .collect()
    }
}

/// Check a package name against `[a-z0-9_+.-]+`
pub fn is_valid_package_name(name: &str) -> bool {
    !name.is_empty()
        && name.chars().all(|c| {
            c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '_' | '+' | '.' | '-')
        })
}

/// Substitute `${VAR}` placeholders in a string
///
/// Variables are looked up in `vars`, then in the process environment.
/// Unset variables expand to an empty string. An unterminated `${` is an error.
pub fn substitute_vars(input: &str, vars: &BTreeMap<String, String>) -> Result<String, ManifestError> {
    let re = Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}")
        .map_err(|e| ManifestError::Substitution(format!("invalid pattern: {e}")))?;

    let mut last_end = 0;
    let mut output = String::new();

    for cap in re.captures_iter(input) {
        let (Some(full_match), Some(name)) = (cap.get(0), cap.get(1)) else {
            continue;
        };
        let unmatched = &input[last_end..full_match.start()];
        check_unterminated(unmatched, input)?;
        output.push_str(unmatched);

        let value = vars
            .get(name.as_str())
            .cloned()
            .or_else(|| std::env::var(name.as_str()).ok())
            .unwrap_or_default();
        output.push_str(&value);

        last_end = full_match.end();
    }

    let rest = &input[last_end..];
    check_unterminated(rest, input)?;
    output.push_str(rest);

    Ok(output)
}

fn check_unterminated(segment: &str, input: &str) -> Result<(), ManifestError> {
    if segment.contains("${") {
        return Err(ManifestError::Substitution(format!(
            "malformed placeholder in '{input}'"
        )));
    }
    Ok(())
}

/// Recursively substitute placeholders in all string values of a TOML value
fn substitute_in_value(
    value: &mut toml::Value,
    vars: &BTreeMap<String, String>,
) -> Result<(), ManifestError> {
    match value {
        toml::Value::String(s) => {
            *s = substitute_vars(s, vars)?;
        }
        toml::Value::Array(arr) => {
            for item in arr.iter_mut() {
                substitute_in_value(item, vars)?;
            }
        }
        toml::Value::Table(table) => {
            for (_, v) in table.iter_mut() {
                substitute_in_value(v, vars)?;
            }
        }
        _ => {}
    }
    Ok(())
}
