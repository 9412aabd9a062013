//! Install action interface
//!
//! The scheduler never looks inside an install action. It hands an
//! [`InstallJob`] to an [`Executor`] and only observes success or failure.
//! The production executor is [`crate::infra::process::ScriptExecutor`].

use futures::future::BoxFuture;
use std::path::PathBuf;
use std::sync::Arc;

use crate::core::build_env::BuildEnvironment;
use crate::core::package::Package;
use crate::core::platform::Platform;
use crate::error::InstallError;

/// What the action is asked to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionMode {
    /// Fetch sources if needed, then install
    Install,
    /// Only fetch upstream sources
    FetchOnly,
}

/// One unit of work handed to an executor
#[derive(Debug, Clone)]
pub struct InstallJob {
    /// Package to install
    pub package: Package,
    /// Environment for the action
    pub env: BuildEnvironment,
    /// Install or fetch only
    pub mode: ActionMode,
    /// Where the action writes its output
    pub log_path: PathBuf,
    /// Capability queries for the target
    pub platform: Arc<dyn Platform>,
}

/// Runs install actions
///
/// Implementations must be safe to call concurrently; the scheduler runs up
/// to `jobs` futures at once. Isolation between concurrent actions is the
/// executor's responsibility.
pub trait Executor: Send + Sync {
    /// Run the action for `job`; `Ok(())` means the package is installed
    fn execute(&self, job: InstallJob) -> BoxFuture<'static, Result<(), InstallError>>;
}
