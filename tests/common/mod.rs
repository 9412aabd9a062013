//! Common test utilities and helpers
//!
//! This module provides shared utilities for integration tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

/// Test distribution tree
///
/// Creates a temporary directory holding a `packages.toml` and install
/// scripts, and runs the `sage-build` binary against it.
pub struct TestProject {
    /// Temporary directory for the test project
    pub dir: TempDir,
}

impl TestProject {
    /// Create a new test project in a temporary directory
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("Failed to create temp directory"),
        }
    }

    /// Get the path to the test project directory
    pub fn path(&self) -> PathBuf {
        self.dir.path().to_path_buf()
    }

    /// Create a file in the test project
    pub fn create_file(&self, name: &str, content: &str) {
        let path = self.dir.path().join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create parent directories");
        }
        std::fs::write(path, content).expect("Failed to write file");
    }

    /// Check if a file exists in the test project
    pub fn file_exists(&self, name: &str) -> bool {
        self.dir.path().join(name).exists()
    }

    /// Read a file from the test project
    pub fn read_file(&self, name: &str) -> String {
        std::fs::read_to_string(self.dir.path().join(name)).expect("Failed to read file")
    }

    /// Write the manifest
    pub fn manifest(&self, content: &str) {
        self.create_file("packages.toml", content);
    }

    /// Write the default install script of `name`
    pub fn install_script(&self, name: &str, body: &str) {
        self.create_file(&format!("build/pkgs/{name}/spkg-install"), body);
    }

    /// Write a script that appends the package name to `order.log`, then
    /// runs `extra`
    pub fn recording_script(&self, name: &str, extra: &str) {
        self.install_script(
            name,
            &format!("echo \"$PKG_NAME\" >> \"$SAGE_ROOT/order.log\"\n{extra}\n"),
        );
    }

    /// Packages recorded by [`Self::recording_script`], in run order
    pub fn recorded_order(&self) -> Vec<String> {
        if !self.file_exists("order.log") {
            return Vec::new();
        }
        self.read_file("order.log")
            .lines()
            .map(ToString::to_string)
            .collect()
    }

    /// Freshness marker path for a package under the default prefix
    pub fn marker(&self, name: &str) -> PathBuf {
        self.path()
            .join("local/var/lib/sage-build/installed")
            .join(name)
    }

    /// Run `sage-build` in the project directory with an empty global config
    pub fn run(&self, args: &[&str]) -> Output {
        run_in(&self.path(), &self.path().join("no-global-config"), args)
    }
}

impl Default for TestProject {
    fn default() -> Self {
        Self::new()
    }
}

/// Run `sage-build` in `dir` with `config_dir` as its config directory
pub fn run_in(dir: &Path, config_dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_sage-build"))
        .current_dir(dir)
        .env("SAGE_BUILD_CONFIG_DIR", config_dir)
        .env_remove("RUST_LOG")
        .args(args)
        .output()
        .expect("Failed to execute sage-build")
}

/// Whether `bash` is available to run install scripts
pub fn has_bash() -> bool {
    which::which("bash").is_ok()
}

/// Three packages: c depends on b, b depends on a
pub const CHAIN_MANIFEST: &str = r#"
[[package]]
name = "c"
version = "3.0"
depends = ["b"]

[[package]]
name = "b"
version = "2.0"
depends = ["a"]

[[package]]
name = "a"
version = "1.0"
"#;
