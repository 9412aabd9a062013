//! Output formatting and progress indicators
//!
//! This module provides utilities for displaying progress bars,
//! status messages and errors to the user.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::io::IsTerminal;

use crate::core::report::PackageStatus;

/// How the CLI talks to the user
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutputConfig {
    /// Suppress all output except errors
    pub quiet: bool,
    /// Machine-readable JSON on stdout
    pub json: bool,
    /// Verbosity level from `-v` flags
    pub verbose: u8,
}

impl OutputConfig {
    /// Create from the global flags
    pub fn new(quiet: bool, json: bool, verbose: u8) -> Self {
        Self {
            quiet,
            json,
            verbose,
        }
    }

    /// Whether human-readable messages should be printed
    pub fn show_messages(&self) -> bool {
        !self.quiet && !self.json
    }

    /// Whether a progress bar should be drawn
    pub fn show_progress(&self) -> bool {
        self.show_messages() && std::io::stderr().is_terminal()
    }

    /// Print a line unless quiet or in JSON mode
    pub fn message(&self, line: impl AsRef<str>) {
        if self.show_messages() {
            println!("{}", line.as_ref());
        }
    }
}

/// Print an error and its causes to stderr
pub fn display_error(error: &anyhow::Error) {
    eprintln!("{} {error}", status::ERROR);
    for cause in error.chain().skip(1) {
        eprintln!("  caused by: {cause}");
    }
}

/// Create a progress bar for build steps
///
/// The bar is hidden unless `output` allows progress drawing.
pub fn create_build_bar(total: u64, output: &OutputConfig) -> ProgressBar {
    if !output.show_progress() {
        return ProgressBar::with_draw_target(Some(total), ProgressDrawTarget::hidden());
    }
    let pb = ProgressBar::new(total);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} packages ({msg})")
    {
        pb.set_style(style.progress_chars("█▓▒░"));
    }
    pb
}

/// Prefix for a terminal package status
pub fn status_symbol(status: &PackageStatus) -> &'static str {
    match status {
        PackageStatus::Succeeded => status::SUCCESS,
        PackageStatus::Failed { .. } => status::ERROR,
        PackageStatus::Skipped(crate::core::report::SkipReason::UpToDate) => status::INFO,
        PackageStatus::Skipped(_) => status::WARNING,
        PackageStatus::Pending | PackageStatus::Running => " ",
    }
}

/// Status message prefixes
pub mod status {
    /// Success prefix (green checkmark)
    pub const SUCCESS: &str = "✓";

    /// Error prefix (red X)
    pub const ERROR: &str = "✗";

    /// Warning prefix (yellow triangle)
    pub const WARNING: &str = "⚠";

    /// Info prefix (blue circle)
    pub const INFO: &str = "ℹ";
}
