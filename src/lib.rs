//! # Lockstep
//!
//! Sequential, memoized, fail-fast execution of async tasks.
//!
//! A [`SerialRunner`] owns an ordered list of task producers and guarantees:
//!
//! - **One at a time** - a task is started only after the previous one
//! - **Start once** - each producer is invoked at most once per runner, no
//!   matter how results are requested
//! - **Fail fast** - a full run stops at the first failing task
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use lockstep::{SerialRunner, Settled, TaskError};
//!
//! let runner = SerialRunner::builder()
//!     .named_task("fetch", || async { Ok(1) })
//!     .named_task("parse", || async { Ok(2) })
//!     .named_task("store", || async { Err(TaskError::msg("disk full")) })
//!     .build();
//!
//! match runner.run_all().await {
//!     Ok(records) => println!("all {} tasks done", records.len()),
//!     Err(failure) => println!("stopped at {}: {:?}", failure.index(), failure.records()),
//! }
//! ```
//!
//! ## Indexed Retrieval
//!
//! Once a runner has left [`RunnerStatus::Open`], [`SerialRunner::get`]
//! starts only the tasks needed to reach an index and hands back the shared
//! computation:
//!
//! ```rust,ignore
//! runner.start();
//! let second = runner.get(1).await?.await?;
//! ```

pub mod recorder;
pub mod runner;
pub mod state;
pub mod task;

pub use recorder::{NoopRecorder, Recorder, TaskStatus};
pub use runner::{RunFailure, RunnerError, SerialRunner, SerialRunnerBuilder, Settled};
pub use state::{RunnerStatus, TaskHandle};
pub use task::{FnTask, Task, TaskError, TaskFailure, TaskFuture};
