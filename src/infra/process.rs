//! Install script execution
//!
//! Runs a package's install script under `bash` with the action environment,
//! sending stdout and stderr to the package log file. Upstream sources are
//! fetched first when the package declares one.

use futures::future::BoxFuture;
use futures::FutureExt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use tokio::process::Command;

use crate::config::defaults;
use crate::core::executor::{ActionMode, Executor, InstallJob};
use crate::error::{FilesystemError, InstallError};
use crate::infra::download::DownloadManager;
use crate::infra::filesystem;

/// Executor running install scripts as subprocesses
#[derive(Debug, Clone)]
pub struct ScriptExecutor {
    /// Shell interpreting the scripts
    shell: PathBuf,
    /// Upstream fetcher
    downloads: DownloadManager,
}

impl ScriptExecutor {
    /// Locate `bash` on `PATH` and use the default download settings
    pub fn new() -> Result<Self, InstallError> {
        let shell = which::which(defaults::INSTALL_SHELL).map_err(|e| InstallError::Spawn {
            package: String::new(),
            error: format!("{} not found: {e}", defaults::INSTALL_SHELL),
        })?;
        Ok(Self::with_shell(shell))
    }

    /// Use a specific shell binary
    pub fn with_shell(shell: impl Into<PathBuf>) -> Self {
        Self {
            shell: shell.into(),
            downloads: DownloadManager::new(),
        }
    }

    /// Use a specific download manager
    #[must_use]
    pub fn with_downloads(mut self, downloads: DownloadManager) -> Self {
        self.downloads = downloads;
        self
    }

    /// Shell binary in use
    pub fn shell(&self) -> &Path {
        &self.shell
    }
}

impl Executor for ScriptExecutor {
    fn execute(&self, job: InstallJob) -> BoxFuture<'static, Result<(), InstallError>> {
        let executor = self.clone();
        async move { executor.run_job(job).await }.boxed()
    }
}

impl ScriptExecutor {
    async fn run_job(&self, job: InstallJob) -> Result<(), InstallError> {
        let name = job.package.name().to_string();

        job.env.validate().map_err(|e| InstallError::Environment {
            package: name.clone(),
            error: e.to_string(),
        })?;

        if let Some(source) = &job.package.source {
            self.downloads
                .fetch_source(source, &job.env.upstream_dir, &name)
                .await
                .map_err(|e| InstallError::Fetch {
                    package: name.clone(),
                    source: e,
                })?;
        }

        if job.mode == ActionMode::FetchOnly {
            return Ok(());
        }

        let script = &job.package.action.script;
        if !script.is_file() {
            return Err(InstallError::Spawn {
                package: name,
                error: format!("install script {} not found", script.display()),
            });
        }

        let log = open_log(&job.log_path)?;
        let mut header = log.try_clone().map_err(|e| log_error(&job.log_path, &e))?;
        writeln!(
            header,
            "==== Installing {} ({}, {}-bit) ====",
            job.package.id,
            job.platform.target_platform(),
            job.platform.word_size()
        )
        .map_err(|e| log_error(&job.log_path, &e))?;
        let stdout = log.try_clone().map_err(|e| log_error(&job.log_path, &e))?;

        let workdir = script.parent().unwrap_or_else(|| Path::new("."));
        tracing::debug!(
            "Running {} {} in {}",
            self.shell.display(),
            script.display(),
            workdir.display()
        );

        let status = Command::new(&self.shell)
            .arg(script)
            .current_dir(workdir)
            .envs(job.env.to_env_map())
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::from(log))
            .status()
            .await
            .map_err(|e| InstallError::Spawn {
                package: name.clone(),
                error: e.to_string(),
            })?;

        if status.success() {
            Ok(())
        } else {
            Err(InstallError::InstallActionFailed {
                package: name,
                status: describe_status(status),
                log: job.log_path,
            })
        }
    }
}

/// Open the package log for appending, creating parent directories
fn open_log(path: &Path) -> Result<std::fs::File, InstallError> {
    if let Some(parent) = path.parent() {
        filesystem::create_dir_all(parent)?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| log_error(path, &e))
}

fn log_error(path: &Path, error: &std::io::Error) -> InstallError {
    InstallError::Filesystem(FilesystemError::WriteFile {
        path: path.to_path_buf(),
        error: error.to_string(),
    })
}

fn describe_status(status: ExitStatus) -> String {
    match status.code() {
        Some(code) => format!("exit status {code}"),
        None => "termination by signal".to_string(),
    }
}
