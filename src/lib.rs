//! # Prometheus Scheduler
//!
//! A scheduler/worker abstraction over heterogeneous execution facilities.
//!
//! A [`Scheduler`] submits tasks to some facility: the calling thread, a
//! dedicated thread, a thread pool, or an executor supplied by the caller. A
//! [`Worker`] created from a scheduler is a sequential lane where tasks run
//! in submission order and never overlap, even when the facility is
//! multi-threaded.
//!
//! Every scheduling call returns a [`TaskHandle`] immediately. Requests that
//! cannot be honored never panic: a scheduler without timer support answers
//! delayed and periodic calls with [`TaskHandle::NOT_TIMED`], and a refused or
//! disposed request comes back as an already-disposed handle carrying a
//! [`Rejection`].
//!
//! ## Strategies
//!
//! | Constructor | Facility | Timed |
//! |---|---|---|
//! | [`schedulers::immediate`] | calling thread | no |
//! | [`schedulers::single`] | one thread | yes |
//! | [`schedulers::single_untimed`] | one thread | no |
//! | [`schedulers::parallel`] / [`schedulers::bounded`] | thread pool | yes |
//! | [`schedulers::from_executor`] / [`schedulers::adopt_executor`] | any [`Executor`] | as reported |
//!
//! ## Example
//!
//! ```rust
//! use std::time::Duration;
//! use prometheus_scheduler::{schedulers, Disposable, Scheduler};
//!
//! let scheduler = schedulers::single()?;
//! let worker = scheduler.create_worker();
//!
//! let (tx, rx) = crossbeam_channel::unbounded();
//! for n in 0..3 {
//!     let tx = tx.clone();
//!     let _ = worker.schedule(Box::new(move || {
//!         let _ = tx.send(n);
//!     }));
//! }
//! let order: Vec<i32> = (0..3)
//!     .map(|_| rx.recv_timeout(Duration::from_secs(5)))
//!     .collect::<Result<_, _>>()?;
//! assert_eq!(order, vec![0, 1, 2]);
//!
//! let periodic = scheduler.schedule_periodically(
//!     Box::new(|| {}),
//!     Duration::from_millis(5),
//!     Duration::from_millis(10),
//! );
//! assert!(!periodic.is_not_timed());
//! periodic.dispose();
//! scheduler.dispose();
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Failures
//!
//! A task that panics is isolated from the facility thread. The failure is
//! passed to the hook installed with [`set_failure_hook`], or logged through
//! `tracing` when none is installed.

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Scheduling contracts, task lifecycle, and built-in strategies.
pub mod core;
/// Configuration models for facilities and scheduler selection.
pub mod config;
/// Builders to construct schedulers from configuration.
pub mod builders;
/// Runtime adapters for async executors.
pub mod runtime;
/// Shared utilities.
pub mod util;

pub use crate::core::{
    failure_hook_installed, schedulers, set_failure_hook, AppResult, Capabilities, Disposable,
    Executor, ExecutorScheduler, ExecutorStats, ImmediateScheduler, Job, Ownership,
    RejectedExecution, Rejection, RepeatingJob, Runnable, Scheduler, SchedulerError, TaskFailure,
    TaskHandle, TaskState, ThreadPoolExecutor, Worker,
};
pub use crate::builders::build_scheduler;
pub use crate::config::{ExecutorConfig, SchedulerConfig, SchedulerKind};
#[cfg(feature = "tokio-runtime")]
pub use crate::runtime::TokioExecutor;
