//! Recording interface for runner execution history.

use async_trait::async_trait;

use crate::state::RunnerStatus;

/// Outcome of a settled task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskStatus {
    /// Task produced a value.
    Fulfilled,
    /// Task failed.
    Rejected { reason: String },
}

/// Records runner execution for observability.
///
/// Errors returned by a recorder are logged and otherwise ignored; they never
/// change the outcome of a task or a run.
#[async_trait]
pub trait Recorder: Send + Sync {
    /// Record the start of a full run.
    async fn start_run(&self, task_count: usize) -> anyhow::Result<()>;

    /// Record that a task's computation is first being driven.
    async fn start_task(&self, index: usize, name: &str) -> anyhow::Result<()>;

    /// Record task completion. Called once per task index.
    async fn complete_task(&self, index: usize, name: &str, status: TaskStatus)
        -> anyhow::Result<()>;

    /// Record the terminal status of a full run.
    async fn complete_run(&self, status: RunnerStatus) -> anyhow::Result<()>;
}

/// A no-op recorder that discards all events.
#[derive(Debug, Clone, Default)]
pub struct NoopRecorder;

impl NoopRecorder {
    /// Create a new no-op recorder.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Recorder for NoopRecorder {
    async fn start_run(&self, _task_count: usize) -> anyhow::Result<()> {
        Ok(())
    }

    async fn start_task(&self, _index: usize, _name: &str) -> anyhow::Result<()> {
        Ok(())
    }

    async fn complete_task(
        &self,
        _index: usize,
        _name: &str,
        _status: TaskStatus,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    async fn complete_run(&self, _status: RunnerStatus) -> anyhow::Result<()> {
        Ok(())
    }
}
