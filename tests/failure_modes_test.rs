//! Tests for failure propagation between full runs and indexed retrieval.
//!
//! A failing task is final: it is never retried, and it blocks every later
//! index from being reached through a sequential walk.

use lockstep::{RunnerError, RunnerStatus, SerialRunner, Task, TaskError, TaskFuture};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

struct CountedTask {
    calls: Arc<AtomicUsize>,
    outcome: Result<i32, &'static str>,
}

impl Task<i32> for CountedTask {
    fn name(&self) -> &'static str {
        if self.outcome.is_ok() {
            "ok"
        } else {
            "failing"
        }
    }

    fn start(&self) -> TaskFuture<i32> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let outcome = self.outcome;
        Box::pin(async move { outcome.map_err(TaskError::msg) })
    }
}

fn scenario() -> (SerialRunner<i32>, Vec<Arc<AtomicUsize>>) {
    let outcomes: [Result<i32, &'static str>; 4] = [Ok(1), Ok(2), Err("boom"), Ok(4)];
    let mut builder = SerialRunner::builder();
    let mut counters = Vec::new();
    for outcome in outcomes {
        let calls = Arc::new(AtomicUsize::new(0));
        counters.push(calls.clone());
        builder = builder.with_task(CountedTask { calls, outcome });
    }
    (builder.build(), counters)
}

fn calls(counters: &[Arc<AtomicUsize>]) -> Vec<usize> {
    counters.iter().map(|c| c.load(Ordering::SeqCst)).collect()
}

#[tokio::test]
async fn test_get_past_failure_is_prerequisite_failure() {
    let (runner, counters) = scenario();
    runner.start();

    let err = runner.get(3).await.unwrap_err();

    match err {
        RunnerError::PrerequisiteFailed { index, source } => {
            assert_eq!(index, 3);
            assert_eq!(source.index(), 2);
            assert_eq!(source.name(), "failing");
            assert_eq!(source.reason(), "boom");
        }
        other => panic!("unexpected error: {other:?}"),
    }

    // the requested task itself is not started
    assert_eq!(calls(&counters), vec![1, 1, 1, 0]);
    assert_eq!(runner.status(), RunnerStatus::Pending);
}

#[tokio::test]
async fn test_get_failing_task_returns_its_failure() {
    let (runner, _) = scenario();
    runner.start();

    let handle = runner.get(2).await.unwrap();
    let failure = handle.await.unwrap_err();
    assert_eq!(failure.reason(), "boom");

    let err = runner.get_value(2).await.unwrap_err();
    assert!(matches!(err, RunnerError::Task(ref f) if f.index() == 2));
    assert_eq!(err.to_string(), "task 2 ('failing') failed: boom");
}

#[tokio::test]
async fn test_earlier_results_usable_after_failed_run() {
    let (runner, counters) = scenario();

    runner.run_all().await.unwrap_err();

    assert_eq!(runner.get_value(0).await.unwrap(), 1);
    assert_eq!(runner.get_value(1).await.unwrap(), 2);
    assert!(matches!(
        runner.get_value(2).await.unwrap_err(),
        RunnerError::Task(_)
    ));
    assert!(matches!(
        runner.get(3).await.unwrap_err(),
        RunnerError::PrerequisiteFailed { index: 3, .. }
    ));

    assert_eq!(calls(&counters), vec![1, 1, 1, 0]);
    assert_eq!(runner.status(), RunnerStatus::Rejected);
}

#[tokio::test]
async fn test_failed_get_walk_then_full_run() {
    let (runner, counters) = scenario();
    runner.start();

    runner.get(3).await.unwrap_err();
    let failure = runner.run_all().await.unwrap_err();

    assert_eq!(failure.index(), 2);
    assert_eq!(failure.records().len(), 3);
    assert_eq!(runner.status(), RunnerStatus::Rejected);
    assert_eq!(calls(&counters), vec![1, 1, 1, 0]);
}

#[tokio::test]
async fn test_task_error_keeps_source() {
    let runner = SerialRunner::builder()
        .named_task("read", || async {
            let err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing.json");
            Err::<i32, _>(TaskError::new(err))
        })
        .build();

    let failure = runner.run_all().await.unwrap_err();
    let source = failure.failure().error();

    assert_eq!(failure.records()[0].reason(), Some("missing.json"));
    assert_eq!(source.to_string(), "missing.json");
}
