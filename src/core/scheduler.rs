//! Dependency-ordered scheduler
//!
//! A bounded worker pool over a validated [`BuildGraph`]:
//!
//! - a package is dispatched only after all its prerequisites are Succeeded
//!   or up to date
//! - eligible packages are dispatched in declaration order
//! - at most `jobs` install actions are in flight
//! - a failure marks the package Failed and every transitive dependent as
//!   skipped; with [`FailurePolicy::KeepGoing`] unrelated branches continue,
//!   with [`FailurePolicy::FailFast`] nothing new is dispatched
//! - cancellation stops dispatching; in-flight actions run to completion
//!
//! There are no retries and no timeouts. A hung action keeps its slot.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::core::build_env::BuildEnvironment;
use crate::core::config::{BuildConfig, FailurePolicy};
use crate::core::executor::{ActionMode, Executor, InstallJob};
use crate::core::freshness::{Freshness, MarkerStore};
use crate::core::graph::BuildGraph;
use crate::core::platform::{HostPlatform, Platform};
use crate::core::report::{BuildReport, PackageReport, PackageStatus, SkipReason};
use crate::error::{GraphError, InstallError};

/// Scheduler progress notifications
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildEvent {
    /// An install action was dispatched
    Started { name: String },
    /// A package reached a terminal status
    Finished { name: String, status: PackageStatus },
}

/// Callback receiving [`BuildEvent`]s
pub type EventCallback = Box<dyn Fn(&BuildEvent) + Send + Sync>;

/// The packages a run must bring up to date
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildPlan {
    /// Targets and their transitive prerequisites
    pub required: BTreeSet<usize>,
    /// Packages whose freshness markers are ignored
    pub forced: BTreeSet<usize>,
}

impl BuildPlan {
    /// Plan for `targets`, or for every standard package when empty
    ///
    /// With `force`, the named targets (or every required package when no
    /// target is named) are rebuilt even when fresh.
    pub fn new(graph: &BuildGraph, targets: &[String], force: bool) -> Result<Self, GraphError> {
        let required = if targets.is_empty() {
            graph.default_targets()
        } else {
            graph.closure(targets)?
        };

        let forced = match (force, targets.is_empty()) {
            (false, _) => BTreeSet::new(),
            (true, true) => required.clone(),
            (true, false) => targets
                .iter()
                .filter_map(|name| graph.index_of(name))
                .collect(),
        };

        Ok(Self { required, forced })
    }

    /// Plan covering every declared package
    pub fn everything(graph: &BuildGraph) -> Self {
        Self {
            required: (0..graph.len()).collect(),
            forced: BTreeSet::new(),
        }
    }

    /// Whether `index` would be skipped as up to date, given which packages
    /// have been (re)installed during this run
    pub fn is_fresh(
        &self,
        graph: &BuildGraph,
        markers: &MarkerStore,
        index: usize,
        reinstalled: &[bool],
    ) -> bool {
        if self.forced.contains(&index) {
            return false;
        }
        if graph.prerequisites(index).iter().any(|&dep| reinstalled[dep]) {
            return false;
        }
        markers.check(graph.package(index)) == Freshness::Fresh
    }

    /// Dry run: required packages in execution order with their expected
    /// freshness
    ///
    /// A package is expected stale when its marker is stale, it is forced,
    /// or any of its prerequisites is expected to be reinstalled.
    pub fn preview(&self, graph: &BuildGraph, markers: &MarkerStore) -> Vec<(usize, Freshness)> {
        let mut reinstalled = vec![false; graph.len()];
        graph
            .topological_order_of(&self.required)
            .into_iter()
            .map(|index| {
                let freshness = if self.is_fresh(graph, markers, index, &reinstalled) {
                    Freshness::Fresh
                } else {
                    reinstalled[index] = true;
                    Freshness::Stale
                };
                (index, freshness)
            })
            .collect()
    }
}

/// Bounded, dependency-ordered executor of install actions
pub struct Scheduler<'a> {
    graph: &'a BuildGraph,
    config: &'a BuildConfig,
    executor: Arc<dyn Executor>,
    markers: MarkerStore,
    platform: Arc<dyn Platform>,
    cancel: CancellationToken,
    on_event: Option<EventCallback>,
}

impl<'a> Scheduler<'a> {
    /// Create a scheduler using markers under the configured prefix
    pub fn new(graph: &'a BuildGraph, config: &'a BuildConfig, executor: Arc<dyn Executor>) -> Self {
        Self {
            graph,
            config,
            executor,
            markers: MarkerStore::new(config.markers_dir()),
            platform: Arc::new(HostPlatform),
            cancel: CancellationToken::new(),
            on_event: None,
        }
    }

    /// Use a different platform answer
    #[must_use]
    pub fn with_platform(mut self, platform: Arc<dyn Platform>) -> Self {
        self.platform = platform;
        self
    }

    /// Stop dispatching when `cancel` fires
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Receive progress events
    #[must_use]
    pub fn with_events(mut self, callback: EventCallback) -> Self {
        self.on_event = Some(callback);
        self
    }

    /// Marker store used for freshness checks
    pub fn markers(&self) -> &MarkerStore {
        &self.markers
    }

    fn emit(&self, event: BuildEvent) {
        if let Some(callback) = &self.on_event {
            callback(&event);
        }
    }

    fn job_for(&self, index: usize) -> InstallJob {
        let package = self.graph.package(index).clone();
        let env = BuildEnvironment::for_package(self.config, &package, self.platform.as_ref());
        let log_path = self.config.logs_dir().join(format!("{}.log", package.id));
        InstallJob {
            package,
            env,
            mode: if self.config.fetch_only {
                ActionMode::FetchOnly
            } else {
                ActionMode::Install
            },
            log_path,
            platform: Arc::clone(&self.platform),
        }
    }

    /// Execute `plan` and report every required package's terminal status
    #[allow(clippy::too_many_lines)]
    pub async fn run(&self, plan: &BuildPlan) -> BuildReport {
        let graph = self.graph;
        let jobs = self.config.jobs.max(1);
        let mut run = RunState::new(graph, plan);
        let mut join_set: JoinSet<(usize, Result<(), InstallError>)> = JoinSet::new();
        let mut task_index: HashMap<tokio::task::Id, usize> = HashMap::new();
        let mut stop = false;

        tracing::info!(
            "Scheduling {} packages with {} jobs ({:?})",
            plan.required.len(),
            jobs,
            self.config.failure_policy
        );

        loop {
            if !stop && self.cancel.is_cancelled() {
                tracing::warn!("Cancellation requested; waiting for running actions");
                run.cancelled = true;
                stop = true;
            }

            while !stop && join_set.len() < jobs {
                let Some(next) = run.ready.pop_first() else {
                    break;
                };
                let package = graph.package(next);

                if !self.config.fetch_only
                    && plan.is_fresh(graph, &self.markers, next, &run.reinstalled)
                {
                    tracing::debug!("{} is up to date", package.id);
                    let status = PackageStatus::Skipped(SkipReason::UpToDate);
                    run.finish(next, status.clone());
                    self.emit(BuildEvent::Finished {
                        name: package.name().to_string(),
                        status,
                    });
                    run.release(graph, next);
                    continue;
                }

                tracing::info!("Starting {}", package.id);
                run.status[next] = PackageStatus::Running;
                run.started.push(package.name().to_string());
                self.emit(BuildEvent::Started {
                    name: package.name().to_string(),
                });

                let job = self.job_for(next);
                let future = self.executor.execute(job);
                let handle = join_set.spawn(async move { (next, future.await) });
                task_index.insert(handle.id(), next);
            }

            if join_set.is_empty() {
                break;
            }

            let joined = tokio::select! {
                joined = join_set.join_next() => joined,
                () = self.cancel.cancelled(), if !stop => None,
            };
            let Some(joined) = joined else {
                continue;
            };

            let (index, outcome) = match joined {
                Ok((index, outcome)) => {
                    task_index.retain(|_, &mut i| i != index);
                    (index, outcome)
                }
                Err(join_error) => {
                    let Some(index) = task_index.remove(&join_error.id()) else {
                        tracing::error!("Lost track of a failed install task: {join_error}");
                        continue;
                    };
                    let package = graph.package(index);
                    (
                        index,
                        Err(InstallError::Spawn {
                            package: package.name().to_string(),
                            error: join_error.to_string(),
                        }),
                    )
                }
            };

            let package = graph.package(index);
            let outcome = outcome.and_then(|()| {
                if self.config.fetch_only {
                    Ok(())
                } else {
                    self.markers.record(package).map_err(InstallError::from)
                }
            });

            match outcome {
                Ok(()) => {
                    tracing::info!("Finished {}", package.id);
                    run.finish(index, PackageStatus::Succeeded);
                    run.reinstalled[index] = !self.config.fetch_only;
                    self.emit(BuildEvent::Finished {
                        name: package.name().to_string(),
                        status: PackageStatus::Succeeded,
                    });
                    run.release(graph, index);
                }
                Err(error) => {
                    tracing::warn!("{} failed: {error}", package.id);
                    let status = PackageStatus::Failed {
                        error: error.to_string(),
                    };
                    run.finish(index, status.clone());
                    run.first_failed.get_or_insert(index);
                    self.emit(BuildEvent::Finished {
                        name: package.name().to_string(),
                        status,
                    });

                    for blocked in run.block_dependents(graph, index) {
                        self.emit(BuildEvent::Finished {
                            name: graph.package(blocked).name().to_string(),
                            status: run.status[blocked].clone(),
                        });
                    }

                    if self.config.failure_policy == FailurePolicy::FailFast && !stop {
                        tracing::warn!("Stopping after first failure");
                        stop = true;
                    }
                }
            }
        }

        run.into_report(graph, plan)
    }
}

/// Mutable state of a single run
struct RunState {
    required: BTreeSet<usize>,
    status: Vec<PackageStatus>,
    /// Unfinished required prerequisites per package
    waiting: Vec<usize>,
    ready: BTreeSet<usize>,
    reinstalled: Vec<bool>,
    started: Vec<String>,
    first_failed: Option<usize>,
    cancelled: bool,
}

impl RunState {
    fn new(graph: &BuildGraph, plan: &BuildPlan) -> Self {
        let mut waiting = vec![0; graph.len()];
        let mut ready = BTreeSet::new();
        for &i in &plan.required {
            waiting[i] = graph
                .prerequisites(i)
                .iter()
                .filter(|dep| plan.required.contains(dep))
                .count();
            if waiting[i] == 0 {
                ready.insert(i);
            }
        }

        Self {
            required: plan.required.clone(),
            status: vec![PackageStatus::Pending; graph.len()],
            waiting,
            ready,
            reinstalled: vec![false; graph.len()],
            started: Vec::new(),
            first_failed: None,
            cancelled: false,
        }
    }

    fn finish(&mut self, index: usize, status: PackageStatus) {
        self.status[index] = status;
    }

    /// Count `index` as done for its dependents and queue the ones now eligible
    fn release(&mut self, graph: &BuildGraph, index: usize) {
        for &dependent in graph.dependents(index) {
            if self.waiting[dependent] == 0 {
                continue;
            }
            self.waiting[dependent] -= 1;
            if self.waiting[dependent] == 0 && self.status[dependent] == PackageStatus::Pending {
                self.ready.insert(dependent);
            }
        }
    }

    /// Mark every pending transitive dependent of a failed package; returns them
    fn block_dependents(&mut self, graph: &BuildGraph, failed: usize) -> Vec<usize> {
        let failed_name = graph.package(failed).name().to_string();
        let mut blocked = Vec::new();
        for dependent in graph.transitive_dependents(failed) {
            if self.required.contains(&dependent) && self.status[dependent] == PackageStatus::Pending {
                self.status[dependent] = PackageStatus::Skipped(SkipReason::PrerequisiteFailed {
                    failed: failed_name.clone(),
                });
                self.ready.remove(&dependent);
                blocked.push(dependent);
            }
        }
        blocked
    }

    fn into_report(mut self, graph: &BuildGraph, plan: &BuildPlan) -> BuildReport {
        for &i in &plan.required {
            if matches!(self.status[i], PackageStatus::Pending | PackageStatus::Running) {
                self.status[i] = PackageStatus::Skipped(SkipReason::Cancelled);
            }
        }

        BuildReport {
            packages: plan
                .required
                .iter()
                .map(|&i| {
                    let package = graph.package(i);
                    PackageReport {
                        name: package.name().to_string(),
                        version: package.version().to_string(),
                        status: self.status[i].clone(),
                    }
                })
                .collect(),
            started: self.started,
            first_failed: self.first_failed.map(|i| graph.package(i).id.to_string()),
            cancelled: self.cancelled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::package::{InstallAction, Package, PackageId, PackageKind};
    use futures::future::BoxFuture;
    use futures::FutureExt;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Executor that records calls and fails the configured packages
    #[derive(Default)]
    struct FakeExecutor {
        calls: Mutex<Vec<String>>,
        failing: Vec<String>,
    }

    impl Executor for FakeExecutor {
        fn execute(&self, job: InstallJob) -> BoxFuture<'static, Result<(), InstallError>> {
            let name = job.package.name().to_string();
            self.calls.lock().unwrap().push(name.clone());
            let fail = self.failing.contains(&name);
            async move {
                if fail {
                    Err(InstallError::InstallActionFailed {
                        package: name,
                        status: "exit status: 1".into(),
                        log: job.log_path,
                    })
                } else {
                    Ok(())
                }
            }
            .boxed()
        }
    }

    fn pkg(name: &str, deps: &[&str]) -> Package {
        Package::new(
            PackageId::new(name, "1.0"),
            deps.iter().map(ToString::to_string).collect(),
            InstallAction::script("/bin/true"),
        )
    }

    #[test]
    fn test_plan_defaults_to_standard_packages() {
        let graph = BuildGraph::new(vec![
            pkg("a", &[]),
            pkg("b", &[]).with_kind(PackageKind::Optional),
        ])
        .unwrap();
        let plan = BuildPlan::new(&graph, &[], false).unwrap();
        assert_eq!(plan.required, BTreeSet::from([0]));
        assert!(plan.forced.is_empty());
    }

    #[test]
    fn test_plan_force_named_targets_only() {
        let graph = BuildGraph::new(vec![pkg("a", &[]), pkg("b", &["a"])]).unwrap();
        let plan = BuildPlan::new(&graph, &["b".to_string()], true).unwrap();
        assert_eq!(plan.required, BTreeSet::from([0, 1]));
        assert_eq!(plan.forced, BTreeSet::from([1]));
    }

    #[tokio::test]
    async fn test_runs_in_dependency_order() {
        let temp = TempDir::new().unwrap();
        let config = BuildConfig::new(temp.path()).with_jobs(1);
        let graph = BuildGraph::new(vec![
            pkg("c", &["b"]),
            pkg("b", &["a"]),
            pkg("a", &[]),
        ])
        .unwrap();
        let executor = Arc::new(FakeExecutor::default());

        let report = Scheduler::new(&graph, &config, executor.clone())
            .run(&BuildPlan::everything(&graph))
            .await;

        assert!(report.success());
        assert_eq!(*executor.calls.lock().unwrap(), vec!["a", "b", "c"]);
        assert_eq!(report.started, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_failure_blocks_transitive_dependents() {
        let temp = TempDir::new().unwrap();
        let config = BuildConfig::new(temp.path()).with_jobs(2);
        let graph = BuildGraph::new(vec![
            pkg("a", &[]),
            pkg("b", &["a"]),
            pkg("c", &["b"]),
            pkg("d", &[]),
        ])
        .unwrap();
        let executor = Arc::new(FakeExecutor {
            failing: vec!["a".into()],
            ..FakeExecutor::default()
        });

        let report = Scheduler::new(&graph, &config, executor.clone())
            .run(&BuildPlan::everything(&graph))
            .await;

        assert!(!report.success());
        assert_eq!(report.first_failed.as_deref(), Some("a-1.0"));
        assert!(matches!(report.status_of("a"), Some(PackageStatus::Failed { .. })));
        for blocked in ["b", "c"] {
            assert_eq!(
                report.status_of(blocked),
                Some(&PackageStatus::Skipped(SkipReason::PrerequisiteFailed {
                    failed: "a".into()
                }))
            );
        }
        assert_eq!(report.status_of("d"), Some(&PackageStatus::Succeeded));
        let calls = executor.calls.lock().unwrap();
        assert!(!calls.contains(&"b".to_string()));
        assert!(!calls.contains(&"c".to_string()));
    }

    #[tokio::test]
    async fn test_fail_fast_stops_dispatching() {
        let temp = TempDir::new().unwrap();
        let config = BuildConfig::new(temp.path())
            .with_jobs(1)
            .with_failure_policy(FailurePolicy::FailFast);
        let graph = BuildGraph::new(vec![pkg("a", &[]), pkg("d", &[])]).unwrap();
        let executor = Arc::new(FakeExecutor {
            failing: vec!["a".into()],
            ..FakeExecutor::default()
        });

        let report = Scheduler::new(&graph, &config, executor.clone())
            .run(&BuildPlan::everything(&graph))
            .await;

        assert_eq!(*executor.calls.lock().unwrap(), vec!["a"]);
        assert_eq!(
            report.status_of("d"),
            Some(&PackageStatus::Skipped(SkipReason::Cancelled))
        );
    }

    #[tokio::test]
    async fn test_fresh_package_is_skipped() {
        let temp = TempDir::new().unwrap();
        let config = BuildConfig::new(temp.path()).with_jobs(1);
        let graph = BuildGraph::new(vec![pkg("a", &[]), pkg("b", &[])]).unwrap();
        MarkerStore::new(config.markers_dir())
            .record(graph.package(0))
            .unwrap();
        let executor = Arc::new(FakeExecutor::default());

        let report = Scheduler::new(&graph, &config, executor.clone())
            .run(&BuildPlan::everything(&graph))
            .await;

        assert!(report.success());
        assert_eq!(*executor.calls.lock().unwrap(), vec!["b"]);
        assert_eq!(
            report.status_of("a"),
            Some(&PackageStatus::Skipped(SkipReason::UpToDate))
        );
    }

    #[tokio::test]
    async fn test_reinstalled_prerequisite_invalidates_dependent() {
        let temp = TempDir::new().unwrap();
        let config = BuildConfig::new(temp.path()).with_jobs(1);
        let graph = BuildGraph::new(vec![pkg("a", &[]), pkg("b", &["a"])]).unwrap();
        // Only b is recorded; a must be installed, which makes b stale.
        MarkerStore::new(config.markers_dir())
            .record(graph.package(1))
            .unwrap();
        let executor = Arc::new(FakeExecutor::default());

        Scheduler::new(&graph, &config, executor.clone())
            .run(&BuildPlan::everything(&graph))
            .await;

        assert_eq!(*executor.calls.lock().unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn test_preview_propagates_staleness() {
        let temp = TempDir::new().unwrap();
        let config = BuildConfig::new(temp.path());
        let graph = BuildGraph::new(vec![
            pkg("a", &[]),
            pkg("b", &["a"]),
            pkg("c", &[]),
        ])
        .unwrap();
        let markers = MarkerStore::new(config.markers_dir());
        markers.record(graph.package(1)).unwrap();
        markers.record(graph.package(2)).unwrap();

        let preview = BuildPlan::everything(&graph).preview(&graph, &markers);

        assert_eq!(
            preview,
            vec![
                (0, Freshness::Stale),
                (1, Freshness::Stale),
                (2, Freshness::Fresh),
            ]
        );
    }

    #[tokio::test]
    async fn test_success_records_markers() {
        let temp = TempDir::new().unwrap();
        let config = BuildConfig::new(temp.path()).with_jobs(2);
        let graph = BuildGraph::new(vec![pkg("a", &[])]).unwrap();

        let scheduler = Scheduler::new(&graph, &config, Arc::new(FakeExecutor::default()));
        scheduler.run(&BuildPlan::everything(&graph)).await;

        assert_eq!(
            scheduler.markers().installed_version("a").as_deref(),
            Some("1.0")
        );
    }

    #[tokio::test]
    async fn test_fetch_only_does_not_record_markers() {
        let temp = TempDir::new().unwrap();
        let config = BuildConfig::new(temp.path()).with_fetch_only(true);
        let graph = BuildGraph::new(vec![pkg("a", &[])]).unwrap();

        let scheduler = Scheduler::new(&graph, &config, Arc::new(FakeExecutor::default()));
        let report = scheduler.run(&BuildPlan::everything(&graph)).await;

        assert!(report.success());
        assert!(scheduler.markers().installed_version("a").is_none());
    }

    #[tokio::test]
    async fn test_pre_cancelled_run_starts_nothing() {
        let temp = TempDir::new().unwrap();
        let config = BuildConfig::new(temp.path());
        let graph = BuildGraph::new(vec![pkg("a", &[])]).unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let executor = Arc::new(FakeExecutor::default());

        let report = Scheduler::new(&graph, &config, executor.clone())
            .with_cancellation(cancel)
            .run(&BuildPlan::everything(&graph))
            .await;

        assert!(report.cancelled);
        assert!(executor.calls.lock().unwrap().is_empty());
        assert_eq!(
            report.status_of("a"),
            Some(&PackageStatus::Skipped(SkipReason::Cancelled))
        );
    }

    /// Cancels the run from inside the first action it executes
    struct CancellingExecutor {
        cancel: CancellationToken,
        calls: Mutex<Vec<String>>,
    }

    impl Executor for CancellingExecutor {
        fn execute(&self, job: InstallJob) -> BoxFuture<'static, Result<(), InstallError>> {
            self.calls.lock().unwrap().push(job.package.name().to_string());
            self.cancel.cancel();
            async { Ok(()) }.boxed()
        }
    }

    #[tokio::test]
    async fn test_cancel_during_run_lets_running_action_finish() {
        let temp = TempDir::new().unwrap();
        let config = BuildConfig::new(temp.path()).with_jobs(2);
        let graph = BuildGraph::new(vec![pkg("a", &[]), pkg("b", &["a"])]).unwrap();
        let cancel = CancellationToken::new();
        let executor = Arc::new(CancellingExecutor {
            cancel: cancel.clone(),
            calls: Mutex::new(Vec::new()),
        });

        let report = Scheduler::new(&graph, &config, executor.clone())
            .with_cancellation(cancel)
            .run(&BuildPlan::everything(&graph))
            .await;

        assert!(report.cancelled);
        assert_eq!(*executor.calls.lock().unwrap(), vec!["a"]);
        assert_eq!(report.status_of("a"), Some(&PackageStatus::Succeeded));
        assert_eq!(
            report.status_of("b"),
            Some(&PackageStatus::Skipped(SkipReason::Cancelled))
        );
        assert_ne!(report.exit_code(), 0);
    }

    #[tokio::test]
    async fn test_events_are_emitted() {
        let temp = TempDir::new().unwrap();
        let config = BuildConfig::new(temp.path()).with_jobs(1);
        let graph = BuildGraph::new(vec![pkg("a", &[])]).unwrap();
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);

        Scheduler::new(&graph, &config, Arc::new(FakeExecutor::default()))
            .with_events(Box::new(move |event| sink.lock().unwrap().push(event.clone())))
            .run(&BuildPlan::everything(&graph))
            .await;

        assert_eq!(
            *events.lock().unwrap(),
            vec![
                BuildEvent::Started { name: "a".into() },
                BuildEvent::Finished {
                    name: "a".into(),
                    status: PackageStatus::Succeeded
                },
            ]
        );
    }
}
