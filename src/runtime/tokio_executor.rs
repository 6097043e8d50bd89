//! Tokio runtime adapter.
//!
//! Tasks are synchronous closures, so they run on tokio's blocking pool via
//! `spawn_blocking`; only the timers live on the async workers. The wrapped
//! runtime must have its time driver enabled.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::{Builder, Handle, Runtime};
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info};

use crate::core::{Capabilities, Executor, Job, RejectedExecution, RepeatingJob, SchedulerError};

/// Roughly thirty years.
const FAR_FUTURE: Duration = Duration::from_secs(30 * 365 * 24 * 60 * 60);

/// An [`Executor`] over a tokio runtime.
pub struct TokioExecutor {
    handle: Handle,
    /// Present only when this executor created the runtime.
    runtime: Mutex<Option<Runtime>>,
    shutdown: Arc<AtomicBool>,
}

impl TokioExecutor {
    /// Submit work to an existing runtime. Shutdown leaves the runtime running.
    #[must_use]
    pub fn new(handle: Handle) -> Self {
        Self {
            handle,
            runtime: Mutex::new(None),
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Wrap the runtime the caller is running on.
    ///
    /// # Errors
    ///
    /// `SchedulerError::Runtime` when called outside a tokio runtime.
    pub fn current() -> Result<Self, SchedulerError> {
        Handle::try_current()
            .map(Self::new)
            .map_err(|e| SchedulerError::Runtime(e.to_string()))
    }

    /// Start and own a multi-threaded runtime with `worker_threads` workers.
    ///
    /// The runtime is shut down in the background when the executor shuts
    /// down.
    ///
    /// # Errors
    ///
    /// `SchedulerError::InvalidConfig` for zero threads,
    /// `SchedulerError::Runtime` if the runtime cannot be built.
    pub fn with_worker_threads(worker_threads: usize) -> Result<Self, SchedulerError> {
        if worker_threads == 0 {
            return Err(SchedulerError::InvalidConfig("worker_threads must be greater than 0".into()));
        }
        let runtime = Builder::new_multi_thread()
            .worker_threads(worker_threads)
            .thread_name("prometheus-scheduler-tokio")
            .enable_all()
            .build()
            .map_err(|e| SchedulerError::Runtime(e.to_string()))?;
        info!(worker_threads, "Tokio runtime started");
        Ok(Self {
            handle: runtime.handle().clone(),
            runtime: Mutex::new(Some(runtime)),
            shutdown: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Handle of the runtime jobs are spawned on.
    #[must_use]
    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    fn check_open(&self) -> Result<(), RejectedExecution> {
        if self.is_shutdown() {
            Err(RejectedExecution::Shutdown)
        } else {
            Ok(())
        }
    }
}

impl Executor for TokioExecutor {
    fn execute(&self, job: Job) -> Result<(), RejectedExecution> {
        self.check_open()?;
        drop(self.handle.spawn_blocking(job));
        Ok(())
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::TIMED
    }

    fn execute_after(&self, job: Job, delay: Duration) -> Result<(), RejectedExecution> {
        self.check_open()?;
        let shutdown = Arc::clone(&self.shutdown);
        let handle = self.handle.clone();
        drop(self.handle.spawn(async move {
            time::sleep(delay).await;
            if !shutdown.load(Ordering::Acquire) {
                drop(handle.spawn_blocking(job));
            }
        }));
        Ok(())
    }

    fn execute_at_fixed_rate(
        &self,
        job: RepeatingJob,
        initial_delay: Duration,
        period: Duration,
    ) -> Result<(), RejectedExecution> {
        if period.is_zero() {
            return Err(RejectedExecution::InvalidPeriod);
        }
        self.check_open()?;

        let shutdown = Arc::clone(&self.shutdown);
        let handle = self.handle.clone();
        drop(self.handle.spawn(async move {
            let now = Instant::now();
            let start = now
                .checked_add(initial_delay)
                .or_else(|| now.checked_add(FAR_FUTURE))
                .unwrap_or(now);
            let mut ticker = time::interval_at(start, period);
            // Late ticks fire back to back, keeping the `start + n * period` schedule.
            ticker.set_missed_tick_behavior(MissedTickBehavior::Burst);

            let mut job = job;
            loop {
                ticker.tick().await;
                if shutdown.load(Ordering::Acquire) {
                    break;
                }
                // The job moves onto the blocking pool for the tick and comes back.
                let tick = handle.spawn_blocking(move || {
                    let again = job();
                    (job, again)
                });
                match tick.await {
                    Ok((returned, true)) => job = returned,
                    Ok((_, false)) => break,
                    Err(e) => {
                        debug!(error = %e, "Periodic tick did not complete; repetition stopped");
                        break;
                    }
                }
            }
        }));
        Ok(())
    }

    fn shutdown(&self) {
        if self.shutdown.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(runtime) = self.runtime.lock().take() {
            runtime.shutdown_background();
            info!("Owned tokio runtime shut down");
        }
    }

    fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }
}

impl Drop for TokioExecutor {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_outside_runtime_fails() {
        assert!(matches!(TokioExecutor::current(), Err(SchedulerError::Runtime(_))));
    }

    #[test]
    fn test_zero_worker_threads_is_invalid() {
        assert!(matches!(
            TokioExecutor::with_worker_threads(0),
            Err(SchedulerError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_owned_runtime_runs_jobs_and_shuts_down() {
        let executor = TokioExecutor::with_worker_threads(1).unwrap();
        let (tx, rx) = std::sync::mpsc::channel();
        executor
            .execute(Box::new(move || {
                let _ = tx.send(7);
            }))
            .unwrap();
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), 7);

        executor.shutdown();
        assert!(executor.is_shutdown());
        assert_eq!(executor.execute(Box::new(|| {})), Err(RejectedExecution::Shutdown));
    }
}
