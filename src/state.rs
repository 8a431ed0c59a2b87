//! Runner lifecycle status and the memo store of started tasks.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use serde::Serialize;

use crate::task::TaskFailure;

/// Lifecycle of a runner.
///
/// Advances only along `Open -> Pending -> {Fulfilled | Rejected}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunnerStatus {
    /// No task has been started.
    Open,
    /// Started, and no full run has settled yet.
    Pending,
    /// A full run completed with every task succeeding.
    Fulfilled,
    /// A full run stopped at a failing task.
    Rejected,
}

impl RunnerStatus {
    /// Returns true for `Fulfilled` and `Rejected`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Fulfilled | Self::Rejected)
    }

    /// Returns true if moving to `next` is a forward (or no-op) transition.
    pub fn can_advance_to(&self, next: RunnerStatus) -> bool {
        match (*self, next) {
            (a, b) if a == b => true,
            (Self::Open, Self::Pending) => true,
            (Self::Pending, Self::Fulfilled | Self::Rejected) => true,
            _ => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Pending => "pending",
            Self::Fulfilled => "fulfilled",
            Self::Rejected => "rejected",
        }
    }
}

impl fmt::Display for RunnerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A started task's computation.
///
/// Clones share one underlying execution: awaiting any of them drives the
/// task and yields the same result.
#[derive(Clone)]
pub struct TaskHandle<T> {
    index: usize,
    name: &'static str,
    inner: Shared<BoxFuture<'static, Result<T, TaskFailure>>>,
}

impl<T: Clone> TaskHandle<T> {
    pub(crate) fn new(
        index: usize,
        name: &'static str,
        fut: BoxFuture<'static, Result<T, TaskFailure>>,
    ) -> Self {
        Self {
            index,
            name,
            inner: fut.shared(),
        }
    }

    /// Position of the task in its runner.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Name of the task.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The result, if the computation has already settled.
    pub fn peek(&self) -> Option<&Result<T, TaskFailure>> {
        self.inner.peek()
    }
}

impl<T: Clone> Future for TaskHandle<T> {
    type Output = Result<T, TaskFailure>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.inner).poll(cx)
    }
}

impl<T> fmt::Debug for TaskHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskHandle")
            .field("index", &self.index)
            .field("name", &self.name)
            .finish()
    }
}

/// Status flag plus the append-only store of started tasks.
///
/// Owned by exactly one runner; slot `i` is written once, after slot `i - 1`.
pub(crate) struct RunnerState<T> {
    status: RunnerStatus,
    started: Vec<TaskHandle<T>>,
}

impl<T> RunnerState<T> {
    pub(crate) fn new() -> Self {
        Self {
            status: RunnerStatus::Open,
            started: Vec::new(),
        }
    }

    pub(crate) fn status(&self) -> RunnerStatus {
        self.status
    }

    /// Move to `next` if that is a forward transition. Returns whether the
    /// status changed.
    pub(crate) fn advance(&mut self, next: RunnerStatus) -> bool {
        if self.status == next || !self.status.can_advance_to(next) {
            return false;
        }
        self.status = next;
        true
    }

    pub(crate) fn handle(&self, index: usize) -> Option<&TaskHandle<T>> {
        self.started.get(index)
    }

    /// Number of populated slots.
    pub(crate) fn len(&self) -> usize {
        self.started.len()
    }

    /// Append the handle for the next index. Refuses anything that would
    /// leave a gap or overwrite a slot.
    pub(crate) fn push(&mut self, handle: TaskHandle<T>) -> bool {
        if handle.index != self.started.len() {
            return false;
        }
        self.started.push(handle);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ready(index: usize, value: i32) -> TaskHandle<i32> {
        TaskHandle::new(index, "ready", async move { Ok(value) }.boxed())
    }

    #[test]
    fn test_status_forward_transitions() {
        let mut state = RunnerState::<i32>::new();
        assert_eq!(state.status(), RunnerStatus::Open);

        assert!(!state.advance(RunnerStatus::Fulfilled));
        assert!(state.advance(RunnerStatus::Pending));
        assert!(!state.advance(RunnerStatus::Pending));
        assert!(state.advance(RunnerStatus::Rejected));

        assert!(!state.advance(RunnerStatus::Fulfilled));
        assert!(!state.advance(RunnerStatus::Pending));
        assert!(!state.advance(RunnerStatus::Open));
        assert_eq!(state.status(), RunnerStatus::Rejected);
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(!RunnerStatus::Open.is_terminal());
        assert!(!RunnerStatus::Pending.is_terminal());
        assert!(RunnerStatus::Fulfilled.is_terminal());
        assert!(RunnerStatus::Rejected.is_terminal());
        assert_eq!(RunnerStatus::Fulfilled.to_string(), "fulfilled");
    }

    #[test]
    fn test_memo_store_stays_contiguous() {
        let mut state = RunnerState::new();

        assert!(!state.push(ready(1, 10)));
        assert!(state.push(ready(0, 10)));
        assert!(!state.push(ready(0, 99)));
        assert!(state.push(ready(1, 20)));
        assert_eq!(state.len(), 2);
        assert!(state.handle(2).is_none());

        let first = state.handle(0).cloned().unwrap();
        assert_eq!(futures::executor::block_on(first).unwrap(), 10);
    }

    #[test]
    fn test_handle_clones_share_result() {
        let handle = ready(0, 5);
        let other = handle.clone();
        assert!(handle.peek().is_none());

        assert_eq!(futures::executor::block_on(other).unwrap(), 5);
        assert!(matches!(handle.peek(), Some(Ok(5))));
    }
}
