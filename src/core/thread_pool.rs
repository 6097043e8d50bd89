//! Built-in execution facility backed by dedicated OS threads.
//!
//! Worker threads block on a crossbeam channel and exit when the sender is
//! dropped. An optional timer thread holds delayed and fixed-rate jobs until
//! they are due, then pushes them through the same channel, so queue bounds
//! and shutdown apply uniformly to all work.
//!
//! Shutdown never joins threads from `shutdown()` or `Drop`; callers that need
//! to wait use [`ThreadPoolExecutor::await_termination`].

mod timer;

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, unbounded, Receiver, Sender, TrySendError};
use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use crate::config::ExecutorConfig;

use super::error::{RejectedExecution, SchedulerError};
use super::executor::{Executor, Job, RepeatingJob};
use super::hooks;
use super::scheduler::Capabilities;

use self::timer::{deadline_after, TimerAction, TimerQueue};

/// Snapshot of pool utilization.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecutorStats {
    /// Number of worker threads.
    pub threads: usize,
    /// Jobs accepted but not yet picked up by a worker.
    pub queued_jobs: u64,
    /// Jobs currently executing.
    pub active_jobs: u64,
    /// Jobs that returned normally.
    pub completed_jobs: u64,
    /// Jobs that panicked.
    pub panicked_jobs: u64,
    /// Submissions refused because the queue was full.
    pub rejected_jobs: u64,
    /// Delayed or periodic entries waiting in the timer.
    pub pending_timers: usize,
}

#[derive(Debug, Default)]
struct PoolCounters {
    queued_jobs: AtomicU64,
    active_jobs: AtomicU64,
    completed_jobs: AtomicU64,
    panicked_jobs: AtomicU64,
    rejected_jobs: AtomicU64,
}

/// State reachable from the timer thread and from re-arming ticks.
struct PoolShared {
    job_tx: Mutex<Option<Sender<Job>>>,
    shutdown: AtomicBool,
    counters: Arc<PoolCounters>,
    timer: Option<TimerQueue>,
}

impl PoolShared {
    fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    fn submit(&self, job: Job) -> Result<(), RejectedExecution> {
        if self.is_shutdown() {
            return Err(RejectedExecution::Shutdown);
        }

        let guard = self.job_tx.lock();
        let Some(job_tx) = guard.as_ref() else {
            return Err(RejectedExecution::Shutdown);
        };
        // Counted before the send so a fast worker never sees it go negative.
        self.counters.queued_jobs.fetch_add(1, Ordering::Relaxed);
        let sent = job_tx.try_send(job);
        drop(guard);

        match sent {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                self.counters.queued_jobs.fetch_sub(1, Ordering::Relaxed);
                self.counters.rejected_jobs.fetch_add(1, Ordering::Relaxed);
                Err(RejectedExecution::Saturated)
            }
            Err(TrySendError::Disconnected(_)) => {
                self.counters.queued_jobs.fetch_sub(1, Ordering::Relaxed);
                Err(RejectedExecution::Shutdown)
            }
        }
    }

    /// Returns `true` if this call flipped the pool into shutdown.
    fn signal_shutdown(&self) -> bool {
        if self.shutdown.swap(true, Ordering::AcqRel) {
            return false;
        }
        let sender = self.job_tx.lock().take();
        drop(sender);
        if let Some(timer) = &self.timer {
            timer.shutdown();
        }
        true
    }
}

/// Fixed-size thread pool with optional timer support.
///
/// Jobs already queued when [`Executor::shutdown`] is called still run; new
/// submissions and pending timer entries are refused or dropped.
pub struct ThreadPoolExecutor {
    config: ExecutorConfig,
    shared: Arc<PoolShared>,
    threads: Mutex<Vec<JoinHandle<()>>>,
}

impl ThreadPoolExecutor {
    /// Spawn the pool described by `config`.
    ///
    /// # Errors
    ///
    /// `SchedulerError::InvalidConfig` if validation fails,
    /// `SchedulerError::ThreadSpawn` if the OS refuses a thread. Threads that
    /// were already started are told to exit.
    pub fn new(config: ExecutorConfig) -> Result<Self, SchedulerError> {
        config.validate().map_err(SchedulerError::InvalidConfig)?;

        let (job_tx, job_rx) = match config.queue_capacity {
            Some(capacity) => bounded::<Job>(capacity),
            None => unbounded::<Job>(),
        };
        let counters = Arc::new(PoolCounters::default());
        let shared = Arc::new(PoolShared {
            job_tx: Mutex::new(Some(job_tx)),
            shutdown: AtomicBool::new(false),
            counters: Arc::clone(&counters),
            timer: config.timer.then(TimerQueue::new),
        });

        let mut pool = Self {
            threads: Mutex::new(Vec::with_capacity(config.threads + 1)),
            config,
            shared,
        };

        for worker_id in 0..pool.config.threads {
            let handle = spawn_worker(worker_id, job_rx.clone(), Arc::clone(&counters), &pool.config)?;
            pool.threads.get_mut().push(handle);
        }
        if pool.shared.timer.is_some() {
            let handle = spawn_timer(Arc::clone(&pool.shared), &pool.config)?;
            pool.threads.get_mut().push(handle);
        }

        info!(
            threads = pool.config.threads,
            queue_capacity = ?pool.config.queue_capacity,
            timer = pool.config.timer,
            prefix = %pool.config.thread_name_prefix,
            "Thread pool started"
        );
        Ok(pool)
    }

    /// Configuration the pool was built from.
    #[must_use]
    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Current utilization counters.
    #[must_use]
    pub fn stats(&self) -> ExecutorStats {
        let counters = &self.shared.counters;
        ExecutorStats {
            threads: self.config.threads,
            queued_jobs: counters.queued_jobs.load(Ordering::Relaxed),
            active_jobs: counters.active_jobs.load(Ordering::Relaxed),
            completed_jobs: counters.completed_jobs.load(Ordering::Relaxed),
            panicked_jobs: counters.panicked_jobs.load(Ordering::Relaxed),
            rejected_jobs: counters.rejected_jobs.load(Ordering::Relaxed),
            pending_timers: self.shared.timer.as_ref().map_or(0, TimerQueue::len),
        }
    }

    /// Wait up to `timeout` for every pool thread to exit after shutdown.
    ///
    /// Returns `false` if the pool is not shut down, or if some thread did not
    /// exit in time (that thread is detached). Calling this from one of the
    /// pool's own threads skips that thread.
    pub fn await_termination(&self, timeout: Duration) -> bool {
        if !self.shared.is_shutdown() {
            return false;
        }

        let handles: Vec<JoinHandle<()>> = self.threads.lock().drain(..).collect();
        let deadline = deadline_after(Instant::now(), timeout);
        let current = thread::current().id();
        let mut terminated = true;

        for handle in handles {
            let name = handle.thread().name().unwrap_or("<unnamed>").to_owned();
            if handle.thread().id() == current {
                debug!(thread = %name, "Skipping join of the calling thread");
                terminated = false;
                continue;
            }

            // Join on a helper thread so the wait can be bounded.
            let (done_tx, done_rx) = bounded::<bool>(1);
            let joiner = thread::Builder::new()
                .name(format!("{}-join", self.config.thread_name_prefix))
                .spawn(move || {
                    let _ = done_tx.send(handle.join().is_ok());
                });
            if let Err(e) = joiner {
                warn!(thread = %name, error = %e, "Could not spawn join helper; detaching");
                terminated = false;
                continue;
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            match done_rx.recv_timeout(remaining) {
                Ok(true) => debug!(thread = %name, "Pool thread joined"),
                Ok(false) => warn!(thread = %name, "Pool thread panicked"),
                Err(_) => {
                    warn!(thread = %name, "Pool thread did not exit within timeout; detaching");
                    terminated = false;
                }
            }
        }

        terminated
    }

    fn schedule_timer(&self, deadline: Instant, action: TimerAction) -> Result<(), RejectedExecution> {
        let Some(timer) = &self.shared.timer else {
            return Err(RejectedExecution::Unsupported);
        };
        if self.shared.is_shutdown() || !timer.insert(deadline, action) {
            return Err(RejectedExecution::Shutdown);
        }
        Ok(())
    }
}

impl Executor for ThreadPoolExecutor {
    fn execute(&self, job: Job) -> Result<(), RejectedExecution> {
        self.shared.submit(job)
    }

    fn capabilities(&self) -> Capabilities {
        if self.shared.timer.is_some() {
            Capabilities::TIMED
        } else {
            Capabilities::IMMEDIATE
        }
    }

    fn execute_after(&self, job: Job, delay: Duration) -> Result<(), RejectedExecution> {
        self.schedule_timer(deadline_after(Instant::now(), delay), TimerAction::Once(job))
    }

    fn execute_at_fixed_rate(
        &self,
        job: RepeatingJob,
        initial_delay: Duration,
        period: Duration,
    ) -> Result<(), RejectedExecution> {
        if self.shared.timer.is_none() {
            return Err(RejectedExecution::Unsupported);
        }
        if period.is_zero() {
            return Err(RejectedExecution::InvalidPeriod);
        }
        self.schedule_timer(
            deadline_after(Instant::now(), initial_delay),
            TimerAction::FixedRate { job, period },
        )
    }

    fn shutdown(&self) {
        if self.shared.signal_shutdown() {
            info!(prefix = %self.config.thread_name_prefix, "Thread pool shutting down");
        }
    }

    fn is_shutdown(&self) -> bool {
        self.shared.is_shutdown()
    }
}

impl Drop for ThreadPoolExecutor {
    fn drop(&mut self) {
        // Threads are detached, not joined.
        if self.shared.signal_shutdown() {
            debug!(
                prefix = %self.config.thread_name_prefix,
                "Thread pool dropped without explicit shutdown"
            );
        }
    }
}

fn spawn_worker(
    worker_id: usize,
    job_rx: Receiver<Job>,
    counters: Arc<PoolCounters>,
    config: &ExecutorConfig,
) -> Result<JoinHandle<()>, SchedulerError> {
    let handle = thread::Builder::new()
        .name(format!("{}-{worker_id}", config.thread_name_prefix))
        .stack_size(config.thread_stack_size)
        .spawn(move || worker_loop(worker_id, &job_rx, &counters))?;
    Ok(handle)
}

fn worker_loop(worker_id: usize, job_rx: &Receiver<Job>, counters: &PoolCounters) {
    debug!(worker_id, "Pool thread started");

    // Queued jobs drain before the disconnect is observed.
    while let Ok(job) = job_rx.recv() {
        counters.queued_jobs.fetch_sub(1, Ordering::Relaxed);
        counters.active_jobs.fetch_add(1, Ordering::Relaxed);

        match panic::catch_unwind(AssertUnwindSafe(job)) {
            Ok(()) => {
                counters.completed_jobs.fetch_add(1, Ordering::Relaxed);
            }
            Err(payload) => {
                counters.panicked_jobs.fetch_add(1, Ordering::Relaxed);
                error!(
                    worker_id,
                    message = %hooks::panic_message(payload.as_ref()),
                    "Pool job panicked"
                );
            }
        }

        counters.active_jobs.fetch_sub(1, Ordering::Relaxed);
    }

    debug!(worker_id, "Pool thread exiting");
}

fn spawn_timer(shared: Arc<PoolShared>, config: &ExecutorConfig) -> Result<JoinHandle<()>, SchedulerError> {
    let handle = thread::Builder::new()
        .name(format!("{}-timer", config.thread_name_prefix))
        .spawn(move || timer_loop(&shared))?;
    Ok(handle)
}

fn timer_loop(shared: &Arc<PoolShared>) {
    let Some(timer) = &shared.timer else {
        return;
    };
    debug!("Timer thread started");

    while let Some(entry) = timer.next_due() {
        match entry.action {
            TimerAction::Once(job) => {
                if let Err(reason) = shared.submit(job) {
                    warn!(%reason, "Delayed job refused by pool queue; job dropped");
                }
            }
            TimerAction::FixedRate { job, period } => {
                let pool = Arc::downgrade(shared);
                let deadline = entry.deadline;
                let tick: Job = Box::new(move || run_tick(&pool, job, deadline, period));
                if let Err(reason) = shared.submit(tick) {
                    warn!(%reason, "Periodic tick refused by pool queue; repetition stopped");
                }
            }
        }
    }

    debug!("Timer thread exiting");
}

/// Run one fixed-rate tick, then arm the next one at `deadline + period`.
///
/// The next tick is armed only after this one returns, so ticks never
/// overlap. A deadline already in the past fires immediately.
fn run_tick(pool: &Weak<PoolShared>, mut job: RepeatingJob, deadline: Instant, period: Duration) {
    if !job() {
        return;
    }
    let Some(shared) = pool.upgrade() else {
        return;
    };
    if shared.is_shutdown() {
        return;
    }
    if let Some(timer) = &shared.timer {
        let next = deadline_after(deadline, period);
        timer.insert(next, TimerAction::FixedRate { job, period });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;
    use std::sync::atomic::AtomicUsize;

    fn pool(threads: usize) -> ThreadPoolExecutor {
        ThreadPoolExecutor::new(
            ExecutorConfig::new()
                .with_threads(threads)
                .with_thread_name_prefix("pool-test"),
        )
        .unwrap()
    }

    #[test]
    fn test_execute_runs_on_named_thread() {
        let pool = pool(2);
        let (tx, rx) = unbounded();
        pool.execute(Box::new(move || {
            let name = thread::current().name().map(str::to_owned);
            let _ = tx.send(name);
        }))
        .unwrap();

        let name = rx.recv_timeout(Duration::from_secs(5)).unwrap().unwrap();
        assert!(name.starts_with("pool-test-"), "unexpected thread name {name}");
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let result = ThreadPoolExecutor::new(ExecutorConfig::new().with_threads(0));
        assert!(matches!(result, Err(SchedulerError::InvalidConfig(_))));
    }

    #[test]
    fn test_capabilities_follow_timer_setting() {
        assert_eq!(pool(1).capabilities(), Capabilities::TIMED);

        let untimed = ThreadPoolExecutor::new(ExecutorConfig::new().with_timer(false)).unwrap();
        assert_eq!(untimed.capabilities(), Capabilities::IMMEDIATE);
        assert_eq!(
            untimed.execute_after(Box::new(|| {}), Duration::from_millis(1)),
            Err(RejectedExecution::Unsupported)
        );
        assert_eq!(
            untimed.execute_at_fixed_rate(Box::new(|| true), Duration::ZERO, Duration::from_millis(1)),
            Err(RejectedExecution::Unsupported)
        );
    }

    #[test]
    fn test_panicking_job_does_not_kill_thread() {
        let pool = pool(1);
        pool.execute(Box::new(|| panic!("pool job failure under test"))).unwrap();

        let (tx, rx) = unbounded();
        pool.execute(Box::new(move || {
            let _ = tx.send(());
        }))
        .unwrap();
        rx.recv_timeout(Duration::from_secs(5)).unwrap();

        assert_eq!(pool.stats().panicked_jobs, 1);
    }

    #[test]
    fn test_bounded_queue_saturates() {
        let pool = ThreadPoolExecutor::new(
            ExecutorConfig::new().with_threads(1).with_queue_capacity(1),
        )
        .unwrap();
        let (started_tx, started_rx) = unbounded();
        let (release_tx, release_rx) = unbounded::<()>();

        pool.execute(Box::new(move || {
            let _ = started_tx.send(());
            let _ = release_rx.recv();
        }))
        .unwrap();
        started_rx.recv_timeout(Duration::from_secs(5)).unwrap();

        pool.execute(Box::new(|| {})).unwrap();
        assert_eq!(pool.execute(Box::new(|| {})), Err(RejectedExecution::Saturated));
        assert_eq!(pool.stats().rejected_jobs, 1);

        drop(release_tx);
    }

    #[test]
    fn test_execute_after_waits_for_delay() {
        let pool = pool(1);
        let (tx, rx) = unbounded();
        let start = Instant::now();
        pool.execute_after(
            Box::new(move || {
                let _ = tx.send(Instant::now());
            }),
            Duration::from_millis(20),
        )
        .unwrap();

        let ran_at = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(ran_at.duration_since(start) >= Duration::from_millis(20));
    }

    #[test]
    fn test_fixed_rate_stops_when_job_returns_false() {
        let pool = pool(2);
        let ticks = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = unbounded();

        let counter = Arc::clone(&ticks);
        pool.execute_at_fixed_rate(
            Box::new(move || {
                let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                if n == 3 {
                    let _ = tx.send(());
                    return false;
                }
                true
            }),
            Duration::from_millis(1),
            Duration::from_millis(2),
        )
        .unwrap();

        rx.recv_timeout(Duration::from_secs(5)).unwrap();
        thread::sleep(Duration::from_millis(30));
        assert_eq!(ticks.load(Ordering::SeqCst), 3);
        assert_eq!(pool.stats().pending_timers, 0);
    }

    #[test]
    fn test_zero_period_is_invalid() {
        let pool = pool(1);
        assert_eq!(
            pool.execute_at_fixed_rate(Box::new(|| true), Duration::ZERO, Duration::ZERO),
            Err(RejectedExecution::InvalidPeriod)
        );
    }

    #[test]
    fn test_shutdown_refuses_work_and_terminates() {
        let pool = pool(2);
        assert!(!pool.await_termination(Duration::from_millis(1)));

        pool.execute_after(Box::new(|| {}), Duration::from_secs(60)).unwrap();
        pool.shutdown();
        pool.shutdown();

        assert!(pool.is_shutdown());
        assert_eq!(pool.execute(Box::new(|| {})), Err(RejectedExecution::Shutdown));
        assert_eq!(
            pool.execute_after(Box::new(|| {}), Duration::ZERO),
            Err(RejectedExecution::Shutdown)
        );
        assert_eq!(pool.stats().pending_timers, 0);
        assert!(pool.await_termination(Duration::from_secs(5)));
    }
}
