//! Serial runner: starts tasks one at a time, in order, at most once each.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use parking_lot::Mutex;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::recorder::{NoopRecorder, Recorder, TaskStatus};
use crate::state::{RunnerState, RunnerStatus, TaskHandle};
use crate::task::{FnTask, Task, TaskError, TaskFailure};

/// Outcome of one task in a full run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Settled<T> {
    /// The task produced a value.
    Fulfilled { value: T },
    /// The task failed; `reason` is its error message.
    Rejected { reason: String },
}

impl<T> Settled<T> {
    pub fn is_fulfilled(&self) -> bool {
        matches!(self, Self::Fulfilled { .. })
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, Self::Rejected { .. })
    }

    /// The value of a fulfilled record.
    pub fn value(&self) -> Option<&T> {
        match self {
            Self::Fulfilled { value } => Some(value),
            Self::Rejected { .. } => None,
        }
    }

    /// The reason of a rejected record.
    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Fulfilled { .. } => None,
            Self::Rejected { reason } => Some(reason),
        }
    }
}

/// A full run that stopped at a failing task.
///
/// `records` holds one entry per task reached, ending with the rejected one.
#[derive(Debug, Clone)]
pub struct RunFailure<T> {
    records: Vec<Settled<T>>,
    failure: TaskFailure,
}

impl<T> RunFailure<T> {
    /// Records of every task reached, in order.
    pub fn records(&self) -> &[Settled<T>] {
        &self.records
    }

    pub fn into_records(self) -> Vec<Settled<T>> {
        self.records
    }

    /// The failure that stopped the run.
    pub fn failure(&self) -> &TaskFailure {
        &self.failure
    }

    /// Index of the failing task.
    pub fn index(&self) -> usize {
        self.failure.index()
    }
}

impl<T> fmt::Display for RunFailure<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "run stopped at task {} after {} record(s): {}",
            self.failure.index(),
            self.records.len(),
            self.failure.reason()
        )
    }
}

impl<T: fmt::Debug> std::error::Error for RunFailure<T> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.failure)
    }
}

/// Error returned by indexed retrieval.
#[derive(Error, Debug, Clone)]
pub enum RunnerError {
    /// Nothing has started the runner yet.
    #[error("task runner is not yet started")]
    NotStarted,

    /// Requested index is outside the task list.
    #[error("index {index} out of bounds for {len} task(s)")]
    IndexOutOfBounds { index: usize, len: usize },

    /// A task before the requested one failed.
    #[error("prerequisite of task {index} failed: {source}")]
    PrerequisiteFailed {
        index: usize,
        #[source]
        source: TaskFailure,
    },

    /// The requested task itself failed.
    #[error(transparent)]
    Task(#[from] TaskFailure),
}

/// Runs an ordered list of tasks one at a time.
///
/// Every task is started at most once for the lifetime of the runner. Both
/// [`run_all`](Self::run_all) and [`get`](Self::get) walk the same memo store
/// of started tasks, so they can be mixed and interleaved freely.
///
/// Task producers are invoked while the memo store is locked and must not
/// call back into the runner.
pub struct SerialRunner<T> {
    tasks: Vec<Box<dyn Task<T>>>,
    recorder: Arc<dyn Recorder>,
    state: Mutex<RunnerState<T>>,
}

impl<T> SerialRunner<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create a runner over the given tasks, in order.
    pub fn new(tasks: Vec<Box<dyn Task<T>>>) -> Self {
        Self::with_parts(tasks, Arc::new(NoopRecorder))
    }

    /// Start building a runner.
    pub fn builder() -> SerialRunnerBuilder<T> {
        SerialRunnerBuilder::new()
    }

    fn with_parts(tasks: Vec<Box<dyn Task<T>>>, recorder: Arc<dyn Recorder>) -> Self {
        Self {
            tasks,
            recorder,
            state: Mutex::new(RunnerState::new()),
        }
    }

    /// Current lifecycle status.
    pub fn status(&self) -> RunnerStatus {
        self.state.lock().status()
    }

    /// Number of tasks.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Number of tasks started so far.
    pub fn started(&self) -> usize {
        self.state.lock().len()
    }

    /// Task names in order.
    pub fn task_names(&self) -> Vec<&'static str> {
        self.tasks.iter().map(|t| t.name()).collect()
    }

    /// Open the runner for indexed retrieval without a full run.
    ///
    /// Moves `Open` to `Pending` and starts the first task, without awaiting
    /// it. Does nothing once the runner has left `Open`.
    pub fn start(&self) -> RunnerStatus {
        let mut state = self.state.lock();
        if state.advance(RunnerStatus::Pending) {
            info!(tasks = self.tasks.len(), "Serial runner started");
            if !self.tasks.is_empty() {
                self.start_task(&mut state, 0);
            }
        }
        state.status()
    }

    /// Drive every task to completion in order, stopping at the first failure.
    pub async fn run_all(&self) -> Result<Vec<Settled<T>>, RunFailure<T>> {
        {
            let mut state = self.state.lock();
            if state.advance(RunnerStatus::Pending) {
                info!(tasks = self.tasks.len(), "Serial runner started");
            }
        }
        if let Err(e) = self.recorder.start_run(self.tasks.len()).await {
            warn!(error = %e, "Recorder failed to record run start");
        }

        let mut records = Vec::with_capacity(self.tasks.len());
        for index in 0..self.tasks.len() {
            let handle = self.task_at(index);
            match handle.await {
                Ok(value) => records.push(Settled::Fulfilled { value }),
                Err(failure) => {
                    self.state.lock().advance(RunnerStatus::Rejected);
                    records.push(Settled::Rejected {
                        reason: failure.reason().to_string(),
                    });
                    info!(
                        index,
                        task = failure.name(),
                        status = %RunnerStatus::Rejected,
                        "Serial run stopped"
                    );
                    self.record_run(RunnerStatus::Rejected).await;
                    return Err(RunFailure { records, failure });
                }
            }
        }

        self.state.lock().advance(RunnerStatus::Fulfilled);
        info!(
            tasks = records.len(),
            status = %RunnerStatus::Fulfilled,
            "Serial run completed"
        );
        self.record_run(RunnerStatus::Fulfilled).await;
        Ok(records)
    }

    /// Retrieve the started task at `index`, starting only what is needed.
    ///
    /// Every earlier task is started and awaited first; the returned handle
    /// itself may still be pending. Does not change the runner's status.
    pub async fn get(&self, index: usize) -> Result<TaskHandle<T>, RunnerError> {
        let len = self.tasks.len();
        {
            let state = self.state.lock();
            if state.status() == RunnerStatus::Open {
                return Err(RunnerError::NotStarted);
            }
            if index >= len {
                return Err(RunnerError::IndexOutOfBounds { index, len });
            }
            if let Some(handle) = state.handle(index) {
                debug!(index, task = handle.name(), "Reusing started task");
                return Ok(handle.clone());
            }
        }

        for prior in 0..index {
            if let Err(failure) = self.task_at(prior).await {
                return Err(RunnerError::PrerequisiteFailed {
                    index,
                    source: failure,
                });
            }
        }

        Ok(self.task_at(index))
    }

    /// Retrieve and await the result of the task at `index`.
    pub async fn get_value(&self, index: usize) -> Result<T, RunnerError> {
        let handle = self.get(index).await?;
        Ok(handle.await?)
    }

    /// The memoized task at `index`, started if this is the first request.
    fn task_at(&self, index: usize) -> TaskHandle<T> {
        let mut state = self.state.lock();
        if let Some(handle) = state.handle(index) {
            return handle.clone();
        }
        self.start_task(&mut state, index)
    }

    fn start_task(&self, state: &mut RunnerState<T>, index: usize) -> TaskHandle<T> {
        let task = &self.tasks[index];
        let name = task.name();
        debug!(index, task = name, "Starting task");

        let fut = task.start();
        let recorder = Arc::clone(&self.recorder);
        let handle = TaskHandle::new(
            index,
            name,
            async move {
                if let Err(e) = recorder.start_task(index, name).await {
                    warn!(index, task = name, error = %e, "Recorder failed to record task start");
                }

                let result = fut.await.map_err(|e| TaskFailure::new(index, name, e));
                let status = match &result {
                    Ok(_) => TaskStatus::Fulfilled,
                    Err(failure) => {
                        warn!(index, task = name, error = %failure.reason(), "Task failed");
                        TaskStatus::Rejected {
                            reason: failure.reason().to_string(),
                        }
                    }
                };

                if let Err(e) = recorder.complete_task(index, name, status).await {
                    warn!(index, task = name, error = %e, "Recorder failed to record task completion");
                }
                result
            }
            .boxed(),
        );

        // Sequential walks only ever ask for the next unstarted index.
        debug_assert_eq!(state.len(), index);
        state.push(handle.clone());
        handle
    }

    async fn record_run(&self, status: RunnerStatus) {
        if let Err(e) = self.recorder.complete_run(status).await {
            warn!(status = %status, error = %e, "Recorder failed to record run completion");
        }
    }
}

impl<T> fmt::Debug for SerialRunner<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("SerialRunner")
            .field("tasks", &self.tasks.len())
            .field("started", &state.len())
            .field("status", &state.status())
            .finish()
    }
}

/// Builder for constructing a [`SerialRunner`].
pub struct SerialRunnerBuilder<T> {
    tasks: Vec<Box<dyn Task<T>>>,
    recorder: Arc<dyn Recorder>,
}

impl<T> SerialRunnerBuilder<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create an empty builder.
    pub fn new() -> Self {
        Self {
            tasks: Vec::new(),
            recorder: Arc::new(NoopRecorder),
        }
    }

    /// Append a task built from a closure.
    pub fn task<F, Fut>(self, f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, TaskError>> + Send + 'static,
    {
        self.with_task(FnTask::new(f))
    }

    /// Append a named task built from a closure.
    pub fn named_task<F, Fut>(self, name: &'static str, f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, TaskError>> + Send + 'static,
    {
        self.with_task(FnTask::named(name, f))
    }

    /// Append any [`Task`] implementation.
    pub fn with_task(mut self, task: impl Task<T> + 'static) -> Self {
        self.tasks.push(Box::new(task));
        self
    }

    /// Set the recorder.
    pub fn with_recorder<R: Recorder + 'static>(mut self, recorder: R) -> Self {
        self.recorder = Arc::new(recorder);
        self
    }

    /// Build the runner.
    pub fn build(self) -> SerialRunner<T> {
        SerialRunner::with_parts(self.tasks, self.recorder)
    }
}

impl<T> Default for SerialRunnerBuilder<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}
