//! Scheduler tests against the library API
//!
//! An in-memory executor stands in for install scripts so that ordering,
//! concurrency and failure propagation can be observed directly.

use futures::future::BoxFuture;
use futures::FutureExt;
use proptest::prelude::*;
use sage_build::core::config::BuildConfig;
use sage_build::core::executor::{Executor, InstallJob};
use sage_build::core::graph::BuildGraph;
use sage_build::core::package::{InstallAction, Package, PackageId};
use sage_build::core::report::{PackageStatus, SkipReason};
use sage_build::core::scheduler::{BuildPlan, Scheduler};
use sage_build::error::{GraphError, InstallError};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::Barrier;

/// Records start and finish order and the peak number of running actions
#[derive(Default)]
struct RecordingExecutor {
    started: Mutex<Vec<String>>,
    finished: Arc<Mutex<Vec<String>>>,
    /// Starts and finishes interleaved, as `+name` and `-name`
    events: Arc<Mutex<Vec<String>>>,
    running: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
    failing: Vec<String>,
    barrier: Option<Arc<Barrier>>,
}

impl Executor for RecordingExecutor {
    fn execute(&self, job: InstallJob) -> BoxFuture<'static, Result<(), InstallError>> {
        let name = job.package.name().to_string();
        self.started.lock().unwrap().push(name.clone());
        self.events.lock().unwrap().push(format!("+{name}"));
        let fail = self.failing.contains(&name);
        let finished = Arc::clone(&self.finished);
        let events = Arc::clone(&self.events);
        let running = Arc::clone(&self.running);
        let peak = Arc::clone(&self.peak);
        let barrier = self.barrier.clone();

        async move {
            let now = running.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            if let Some(barrier) = barrier {
                barrier.wait().await;
            } else {
                tokio::task::yield_now().await;
            }
            running.fetch_sub(1, Ordering::SeqCst);
            finished.lock().unwrap().push(name.clone());
            events.lock().unwrap().push(format!("-{name}"));
            if fail {
                Err(InstallError::InstallActionFailed {
                    package: name,
                    status: "exit status 1".to_string(),
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

#[tokio::test]
async fn test_independent_packages_run_concurrently() {
    let n = 4;
    let temp = TempDir::new().unwrap();
    let config = BuildConfig::new(temp.path()).with_jobs(n);
    let graph = BuildGraph::new((0..n).map(|i| pkg(&format!("p{i}"), &[])).collect()).unwrap();
    // Every action waits until all n are running; serialization would hang
    let executor = Arc::new(RecordingExecutor {
        barrier: Some(Arc::new(Barrier::new(n))),
        ..RecordingExecutor::default()
    });

    let report = tokio::time::timeout(
        Duration::from_secs(10),
        Scheduler::new(&graph, &config, executor.clone()).run(&BuildPlan::everything(&graph)),
    )
    .await
    .expect("independent packages were serialized");

    assert!(report.success());
    assert_eq!(executor.peak.load(Ordering::SeqCst), n);
}

#[tokio::test]
async fn test_concurrency_limit_is_respected() {
    let temp = TempDir::new().unwrap();
    let config = BuildConfig::new(temp.path()).with_jobs(2);
    let graph = BuildGraph::new((0..6).map(|i| pkg(&format!("p{i}"), &[])).collect()).unwrap();
    let executor = Arc::new(RecordingExecutor::default());

    let report = Scheduler::new(&graph, &config, executor.clone())
        .run(&BuildPlan::everything(&graph))
        .await;

    assert!(report.success());
    assert!(executor.peak.load(Ordering::SeqCst) <= 2);
    assert_eq!(
        *executor.started.lock().unwrap(),
        vec!["p0", "p1", "p2", "p3", "p4", "p5"]
    );
}

#[tokio::test]
async fn test_diamond_b_and_c_eligible_together() {
    let temp = TempDir::new().unwrap();
    let config = BuildConfig::new(temp.path()).with_jobs(2);
    let graph = BuildGraph::new(vec![pkg("a", &[]), pkg("b", &["a"]), pkg("c", &["a"])]).unwrap();
    let executor = Arc::new(RecordingExecutor::default());

    let report = Scheduler::new(&graph, &config, executor.clone())
        .run(&BuildPlan::everything(&graph))
        .await;

    assert!(report.success());
    assert_eq!(*executor.started.lock().unwrap(), vec!["a", "b", "c"]);
    assert_eq!(executor.finished.lock().unwrap()[0], "a");
    assert_eq!(report.exit_code(), 0);
}

#[tokio::test]
async fn test_diamond_root_failure_blocks_both() {
    let temp = TempDir::new().unwrap();
    let config = BuildConfig::new(temp.path()).with_jobs(2);
    let graph = BuildGraph::new(vec![pkg("a", &[]), pkg("b", &["a"]), pkg("c", &["a"])]).unwrap();
    let executor = Arc::new(RecordingExecutor {
        failing: vec!["a".to_string()],
        ..RecordingExecutor::default()
    });

    let report = Scheduler::new(&graph, &config, executor.clone())
        .run(&BuildPlan::everything(&graph))
        .await;

    assert_eq!(*executor.started.lock().unwrap(), vec!["a"]);
    let blocked = PackageStatus::Skipped(SkipReason::PrerequisiteFailed {
        failed: "a".to_string(),
    });
    assert_eq!(report.status_of("b"), Some(&blocked));
    assert_eq!(report.status_of("c"), Some(&blocked));
    assert_ne!(report.exit_code(), 0);
}

#[test]
fn test_cycle_rejected_before_scheduling() {
    let result = BuildGraph::new(vec![pkg("a", &["c"]), pkg("b", &["a"]), pkg("c", &["b"])]);

    match result {
        Err(GraphError::CyclicDependency { cycle }) => {
            assert_eq!(cycle.first(), cycle.last());
            assert_eq!(cycle.len(), 4);
        }
        other => panic!("expected a cycle, got {other:?}"),
    }
}

/// Random DAGs: each package may depend on any earlier-generated package
fn dag_strategy() -> impl Strategy<Value = Vec<Vec<usize>>> {
    (1usize..12).prop_flat_map(|n| {
        (0..n)
            .map(|i| proptest::collection::vec(0..i.max(1), 0..=i.min(3)))
            .collect::<Vec<_>>()
    })
}

fn graph_from(edges: &[Vec<usize>]) -> BuildGraph {
    // Declared in reverse so declaration order differs from generation order
    let packages = edges
        .iter()
        .enumerate()
        .rev()
        .map(|(i, deps)| {
            let deps: Vec<String> = deps
                .iter()
                .filter(|&&d| d < i)
                .map(|d| format!("p{d}"))
                .collect();
            Package::new(
                PackageId::new(format!("p{i}"), "1.0"),
                deps,
                InstallAction::script("/bin/true"),
            )
        })
        .collect();
    BuildGraph::new(packages).unwrap()
}

proptest! {
    #[test]
    fn prop_actions_start_after_prerequisites_finish(
        edges in dag_strategy(),
        jobs in 1usize..4,
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let temp = TempDir::new().unwrap();
        let config = BuildConfig::new(temp.path()).with_jobs(jobs);
        let graph = graph_from(&edges);
        let executor = Arc::new(RecordingExecutor::default());

        let report = runtime.block_on(
            Scheduler::new(&graph, &config, executor.clone()).run(&BuildPlan::everything(&graph)),
        );

        prop_assert!(report.success());
        prop_assert_eq!(executor.started.lock().unwrap().len(), graph.len());
        prop_assert!(executor.peak.load(Ordering::SeqCst) <= jobs);

        // A package may only start after each prerequisite has finished
        let events = executor.events.lock().unwrap().clone();
        let position: HashMap<&str, usize> = events
            .iter()
            .enumerate()
            .map(|(i, e)| (e.as_str(), i))
            .collect();
        for (index, package) in graph.packages().iter().enumerate() {
            let start = position[format!("+{}", package.name()).as_str()];
            for &dep in graph.prerequisites(index) {
                let done = position[format!("-{}", graph.package(dep).name()).as_str()];
                prop_assert!(done < start);
            }
        }
    }
}
