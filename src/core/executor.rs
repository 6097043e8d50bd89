//! Execution facility abstraction.
//!
//! An [`Executor`] is whatever actually owns threads: the built-in
//! [`ThreadPoolExecutor`](crate::core::ThreadPoolExecutor), a tokio runtime,
//! or a caller's own pool. Schedulers only route work to it.
//!
//! Facilities differ in what they can do. Each one reports its
//! [`Capabilities`] once; the timed methods have default bodies that refuse
//! with [`RejectedExecution::Unsupported`], so an immediate-only facility
//! implements just `execute`, `shutdown` and `is_shutdown`.
//!
//! # Example
//!
//! ```rust
//! use std::sync::atomic::{AtomicBool, Ordering};
//! use prometheus_scheduler::core::{Executor, Job, RejectedExecution};
//!
//! /// Runs every job on a fresh OS thread.
//! struct ThreadPerJob {
//!     shutdown: AtomicBool,
//! }
//!
//! impl Executor for ThreadPerJob {
//!     fn execute(&self, job: Job) -> Result<(), RejectedExecution> {
//!         if self.is_shutdown() {
//!             return Err(RejectedExecution::Shutdown);
//!         }
//!         std::thread::Builder::new()
//!             .spawn(job)
//!             .map(drop)
//!             .map_err(|_| RejectedExecution::Saturated)
//!     }
//!
//!     fn shutdown(&self) {
//!         self.shutdown.store(true, Ordering::Release);
//!     }
//!
//!     fn is_shutdown(&self) -> bool {
//!         self.shutdown.load(Ordering::Acquire)
//!     }
//! }
//! ```

use std::sync::Arc;
use std::time::Duration;

use super::error::RejectedExecution;
use super::scheduler::Capabilities;

/// A unit of work handed to a facility. Runs at most once.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// A unit of work run once per tick.
///
/// Returns `false` when it should not be run again.
pub type RepeatingJob = Box<dyn FnMut() -> bool + Send + 'static>;

/// A task-execution facility.
pub trait Executor: Send + Sync {
    /// Submit `job` for execution as soon as possible.
    ///
    /// # Errors
    ///
    /// `Shutdown` if the facility no longer accepts work, `Saturated` if its
    /// queue is full.
    fn execute(&self, job: Job) -> Result<(), RejectedExecution>;

    /// Timed submission kinds this facility implements natively.
    fn capabilities(&self) -> Capabilities {
        Capabilities::IMMEDIATE
    }

    /// Submit `job` to run once `delay` has elapsed.
    ///
    /// # Errors
    ///
    /// `Unsupported` unless [`Capabilities::DELAY`] is reported.
    fn execute_after(&self, _job: Job, _delay: Duration) -> Result<(), RejectedExecution> {
        Err(RejectedExecution::Unsupported)
    }

    /// Run `job` after `initial_delay`, then every `period` while it returns
    /// `true`.
    ///
    /// Implementations must not start a tick before the previous one returned.
    ///
    /// # Errors
    ///
    /// `Unsupported` unless [`Capabilities::PERIODIC`] is reported,
    /// `InvalidPeriod` for a zero period.
    fn execute_at_fixed_rate(
        &self,
        _job: RepeatingJob,
        _initial_delay: Duration,
        _period: Duration,
    ) -> Result<(), RejectedExecution> {
        Err(RejectedExecution::Unsupported)
    }

    /// Stop accepting work. Must not block.
    fn shutdown(&self);

    /// Whether `shutdown` has been called.
    fn is_shutdown(&self) -> bool;
}

impl<E: Executor + ?Sized> Executor for Arc<E> {
    fn execute(&self, job: Job) -> Result<(), RejectedExecution> {
        (**self).execute(job)
    }

    fn capabilities(&self) -> Capabilities {
        (**self).capabilities()
    }

    fn execute_after(&self, job: Job, delay: Duration) -> Result<(), RejectedExecution> {
        (**self).execute_after(job, delay)
    }

    fn execute_at_fixed_rate(
        &self,
        job: RepeatingJob,
        initial_delay: Duration,
        period: Duration,
    ) -> Result<(), RejectedExecution> {
        (**self).execute_at_fixed_rate(job, initial_delay, period)
    }

    fn shutdown(&self) {
        (**self).shutdown();
    }

    fn is_shutdown(&self) -> bool {
        (**self).is_shutdown()
    }
}
