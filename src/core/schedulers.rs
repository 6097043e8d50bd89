//! Constructors for the standard scheduling strategies.

use std::sync::Arc;

use crate::config::ExecutorConfig;

use super::error::SchedulerError;
use super::executor::Executor;
use super::executor_scheduler::{ExecutorScheduler, Ownership};
use super::immediate::ImmediateScheduler;
use super::thread_pool::ThreadPoolExecutor;

/// Run everything on the calling thread.
#[must_use]
pub fn immediate() -> ImmediateScheduler {
    ImmediateScheduler::new()
}

/// One dedicated thread with timer support.
///
/// # Errors
///
/// `SchedulerError::ThreadSpawn` if a thread cannot be started.
pub fn single() -> Result<ExecutorScheduler, SchedulerError> {
    from_config(ExecutorConfig::new().with_threads(1))
}

/// One dedicated thread without timer support.
///
/// Delayed and periodic calls return [`TaskHandle::NOT_TIMED`](super::TaskHandle::NOT_TIMED).
///
/// # Errors
///
/// `SchedulerError::ThreadSpawn` if the thread cannot be started.
pub fn single_untimed() -> Result<ExecutorScheduler, SchedulerError> {
    from_config(ExecutorConfig::new().with_threads(1).with_timer(false))
}

/// `threads` pool threads sharing an unbounded queue.
///
/// # Errors
///
/// `SchedulerError::InvalidConfig` for zero threads,
/// `SchedulerError::ThreadSpawn` if a thread cannot be started.
pub fn parallel(threads: usize) -> Result<ExecutorScheduler, SchedulerError> {
    from_config(ExecutorConfig::new().with_threads(threads))
}

/// One pool thread per logical CPU.
///
/// # Errors
///
/// `SchedulerError::ThreadSpawn` if a thread cannot be started.
pub fn parallel_default() -> Result<ExecutorScheduler, SchedulerError> {
    parallel(num_cpus::get())
}

/// `threads` pool threads with at most `queue_capacity` waiting jobs.
///
/// Submissions beyond the bound come back refused with
/// [`RejectedExecution::Saturated`](super::RejectedExecution::Saturated).
///
/// # Errors
///
/// `SchedulerError::InvalidConfig` for a zero thread count or capacity,
/// `SchedulerError::ThreadSpawn` if a thread cannot be started.
pub fn bounded(threads: usize, queue_capacity: usize) -> Result<ExecutorScheduler, SchedulerError> {
    from_config(
        ExecutorConfig::new()
            .with_threads(threads)
            .with_queue_capacity(queue_capacity),
    )
}

/// Build a pool from `config` and own it.
///
/// # Errors
///
/// Whatever [`ThreadPoolExecutor::new`] returns.
pub fn from_config(config: ExecutorConfig) -> Result<ExecutorScheduler, SchedulerError> {
    let pool = ThreadPoolExecutor::new(config)?;
    Ok(ExecutorScheduler::adopt(pool))
}

/// Schedule onto a caller-managed facility, leaving it running on dispose.
pub fn from_executor(executor: Arc<dyn Executor>) -> ExecutorScheduler {
    ExecutorScheduler::new(executor, Ownership::Wrapped)
}

/// Schedule onto `executor` and shut it down on dispose.
pub fn adopt_executor(executor: impl Executor + 'static) -> ExecutorScheduler {
    ExecutorScheduler::new(Arc::new(executor), Ownership::Owned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Capabilities, Scheduler};

    #[test]
    fn test_factory_capabilities() {
        assert_eq!(immediate().capabilities(), Capabilities::IMMEDIATE);
        assert_eq!(single().unwrap().capabilities(), Capabilities::TIMED);
        assert_eq!(single_untimed().unwrap().capabilities(), Capabilities::IMMEDIATE);
        assert_eq!(bounded(2, 8).unwrap().capabilities(), Capabilities::TIMED);
    }

    #[test]
    fn test_factory_ownership() {
        assert_eq!(parallel(2).unwrap().ownership(), Ownership::Owned);

        let pool: Arc<dyn Executor> = Arc::new(ThreadPoolExecutor::new(ExecutorConfig::new()).unwrap());
        let scheduler = from_executor(Arc::clone(&pool));
        assert_eq!(scheduler.ownership(), Ownership::Wrapped);
        drop(scheduler);
        assert!(!pool.is_shutdown());
        pool.shutdown();
    }

    #[test]
    fn test_invalid_sizes_fail() {
        assert!(matches!(parallel(0), Err(SchedulerError::InvalidConfig(_))));
        assert!(matches!(bounded(1, 0), Err(SchedulerError::InvalidConfig(_))));
    }
}
