//! Task trait and error types.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use thiserror::Error;

/// Pending computation returned by starting a task.
pub type TaskFuture<T> = BoxFuture<'static, Result<T, TaskError>>;

/// Error returned by a task execution.
#[derive(Error, Debug)]
#[error(transparent)]
pub struct TaskError(#[from] anyhow::Error);

impl TaskError {
    /// Wrap any error.
    pub fn new(err: impl Into<anyhow::Error>) -> Self {
        Self(err.into())
    }

    /// Create an error from a plain message.
    pub fn msg<M>(message: M) -> Self
    where
        M: fmt::Display + fmt::Debug + Send + Sync + 'static,
    {
        Self(anyhow::Error::msg(message))
    }

    /// Unwrap into the underlying error.
    pub fn into_inner(self) -> anyhow::Error {
        self.0
    }
}

/// A task that failed, as memoized by the runner.
///
/// Cheap to clone: every caller awaiting the same started task observes the
/// same failure.
#[derive(Error, Debug, Clone)]
#[error("task {index} ('{name}') failed: {reason}")]
pub struct TaskFailure {
    index: usize,
    name: &'static str,
    reason: String,
    #[source]
    source: Arc<TaskError>,
}

impl TaskFailure {
    pub(crate) fn new(index: usize, name: &'static str, error: TaskError) -> Self {
        Self {
            index,
            name,
            reason: error.to_string(),
            source: Arc::new(error),
        }
    }

    /// Position of the failed task.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Name of the failed task.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The task error's message.
    pub fn reason(&self) -> &str {
        &self.reason
    }

    /// The error the task returned.
    pub fn error(&self) -> &TaskError {
        &self.source
    }
}

/// A unit of work sequenced by a [`SerialRunner`](crate::SerialRunner).
///
/// Calling [`start`](Task::start) begins the work and hands back its pending
/// computation. The runner calls it at most once per task.
pub trait Task<T>: Send + Sync {
    /// The name of this task for logging and recording.
    fn name(&self) -> &'static str {
        "task"
    }

    /// Start the task.
    fn start(&self) -> TaskFuture<T>;
}

/// Adapts a zero-argument closure returning a future into a [`Task`].
pub struct FnTask<F> {
    name: &'static str,
    f: F,
}

impl<F> FnTask<F> {
    /// Wrap a closure under the default name.
    pub fn new(f: F) -> Self {
        Self { name: "task", f }
    }

    /// Wrap a closure under the given name.
    pub fn named(name: &'static str, f: F) -> Self {
        Self { name, f }
    }
}

impl<T, F, Fut> Task<T> for FnTask<F>
where
    T: Send + 'static,
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<T, TaskError>> + Send + 'static,
{
    fn name(&self) -> &'static str {
        self.name
    }

    fn start(&self) -> TaskFuture<T> {
        Box::pin((self.f)())
    }
}

impl<F> fmt::Debug for FnTask<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnTask").field("name", &self.name).finish()
    }
}
