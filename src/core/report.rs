//! Build summary
//!
//! The report lists the terminal status of every package the run was asked
//! to build, in declaration order, and decides the process exit code.

use serde::Serialize;
use std::fmt;

/// Why a package was not run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    /// Freshness marker matches the declared version
    UpToDate,
    /// A prerequisite failed, so this package is unreachable
    PrerequisiteFailed {
        /// The package whose action failed
        failed: String,
    },
    /// Dispatching stopped (fail-fast or cancellation) before it started
    Cancelled,
}

/// Execution state of one package
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "detail", rename_all = "snake_case")]
pub enum PackageStatus {
    /// Waiting for prerequisites or a worker slot
    Pending,
    /// Install action in flight
    Running,
    /// Install action reported success
    Succeeded,
    /// Install action reported failure
    Failed {
        /// Error message
        error: String,
    },
    /// Not run
    Skipped(SkipReason),
}

impl PackageStatus {
    /// Whether dependents may proceed past this package
    pub fn is_satisfied(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Skipped(SkipReason::UpToDate))
    }
}

impl fmt::Display for PackageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Succeeded => write!(f, "installed"),
            Self::Failed { .. } => write!(f, "FAILED"),
            Self::Skipped(SkipReason::UpToDate) => write!(f, "up to date"),
            Self::Skipped(SkipReason::PrerequisiteFailed { failed }) => {
                write!(f, "blocked by {failed}")
            }
            Self::Skipped(SkipReason::Cancelled) => write!(f, "not started"),
        }
    }
}

/// Terminal status of one package
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackageReport {
    /// Package name
    pub name: String,
    /// Declared version
    pub version: String,
    /// Terminal status
    pub status: PackageStatus,
}

/// Summary of one orchestrator run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BuildReport {
    /// Every required package, in declaration order
    pub packages: Vec<PackageReport>,
    /// Packages whose action was started, in start order
    pub started: Vec<String>,
    /// First package whose action failed
    pub first_failed: Option<String>,
    /// Whether dispatching was cancelled
    pub cancelled: bool,
}

impl BuildReport {
    /// Whether every required package reached Succeeded or up-to-date
    pub fn success(&self) -> bool {
        self.packages.iter().all(|p| p.status.is_satisfied())
    }

    /// Process exit code for this run
    pub fn exit_code(&self) -> i32 {
        i32::from(!self.success())
    }

    /// Status of a package by name
    pub fn status_of(&self, name: &str) -> Option<&PackageStatus> {
        self.packages
            .iter()
            .find(|p| p.name == name)
            .map(|p| &p.status)
    }

    /// Number of packages whose status satisfies `predicate`
    pub fn count(&self, predicate: impl Fn(&PackageStatus) -> bool) -> usize {
        self.packages.iter().filter(|p| predicate(&p.status)).count()
    }

    /// Human-readable summary table
    pub fn format_summary(&self) -> String {
        let width = self
            .packages
            .iter()
            .map(|p| p.name.len() + p.version.len() + 1)
            .max()
            .unwrap_or(0);

        let mut output = String::new();
        for pkg in &self.packages {
            let id = format!("{}-{}", pkg.name, pkg.version);
            output.push_str(&format!("  {id:<width$}  {}\n", pkg.status));
        }

        let installed = self.count(|s| matches!(s, PackageStatus::Succeeded));
        let fresh = self.count(|s| matches!(s, PackageStatus::Skipped(SkipReason::UpToDate)));
        let failed = self.count(|s| matches!(s, PackageStatus::Failed { .. }));
        let blocked = self.count(|s| {
            matches!(
                s,
                PackageStatus::Skipped(SkipReason::PrerequisiteFailed { .. } | SkipReason::Cancelled)
            )
        });
        output.push_str(&format!(
            "\n{installed} installed, {fresh} up to date, {failed} failed, {blocked} not built\n"
        ));
        if let Some(first) = &self.first_failed {
            output.push_str(&format!("First failure: {first}\n"));
        }
        output
    }
}
