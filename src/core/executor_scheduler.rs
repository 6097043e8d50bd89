//! Scheduler adapter over any [`Executor`].
//!
//! The adapter creates no threads of its own. Direct submissions go straight
//! to the facility; worker submissions go through a per-worker
//! [`SerialLane`] whose drain runs as one facility job, which is what gives a
//! worker its FIFO, non-overlapping order on a multi-threaded facility.

use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;

use tracing::{debug, info, warn};

use super::disposable::{Disposable, TaskHandle};
use super::error::RejectedExecution;
use super::executor::{Executor, Job, RepeatingJob};
use super::lane::SerialLane;
use super::scheduler::{Capabilities, Scheduler, Worker};
use super::task::{Runnable, TaskCell, TaskTracker};

/// Whether disposing the scheduler also shuts the facility down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ownership {
    /// The scheduler owns the facility and shuts it down on dispose.
    Owned,
    /// The facility belongs to the caller and is left running.
    Wrapped,
}

struct Core {
    executor: Arc<dyn Executor>,
    capabilities: Capabilities,
    ownership: Ownership,
    tasks: Arc<TaskTracker>,
}

impl Core {
    fn accept(cell: Arc<TaskCell>, submitted: Result<(), RejectedExecution>) -> TaskHandle {
        match submitted {
            Ok(()) => TaskHandle::from_cell(cell),
            Err(reason) => {
                cell.dispose();
                warn!(task_id = cell.id(), %reason, "Executor refused task");
                TaskHandle::refused(reason)
            }
        }
    }
}

/// [`Scheduler`] backed by an [`Executor`].
///
/// Capabilities are read from the executor once, at construction.
pub struct ExecutorScheduler {
    core: Arc<Core>,
}

impl ExecutorScheduler {
    /// Adapt `executor` with the given ownership.
    pub fn new(executor: Arc<dyn Executor>, ownership: Ownership) -> Self {
        let capabilities = executor.capabilities();
        debug!(?capabilities, ?ownership, "Executor scheduler created");
        Self {
            core: Arc::new(Core {
                executor,
                capabilities,
                ownership,
                tasks: TaskTracker::new(),
            }),
        }
    }

    /// Take ownership of `executor`; disposing the scheduler shuts it down.
    pub fn adopt(executor: impl Executor + 'static) -> Self {
        Self::new(Arc::new(executor), Ownership::Owned)
    }

    /// Share a caller-managed `executor`; disposing leaves it running.
    pub fn wrap(executor: Arc<dyn Executor>) -> Self {
        Self::new(executor, Ownership::Wrapped)
    }

    /// Ownership mode chosen at construction.
    #[must_use]
    pub fn ownership(&self) -> Ownership {
        self.core.ownership
    }

    /// The underlying facility.
    #[must_use]
    pub fn executor(&self) -> &Arc<dyn Executor> {
        &self.core.executor
    }
}

impl Scheduler for ExecutorScheduler {
    fn capabilities(&self) -> Capabilities {
        self.core.capabilities
    }

    fn create_worker(&self) -> Box<dyn Worker> {
        let tasks = self.core.tasks.child();
        debug!(disposed = tasks.is_disposed(), "Worker created");
        Box::new(ExecutorWorker {
            shared: Arc::new(WorkerShared {
                core: Arc::clone(&self.core),
                tasks,
                lane: SerialLane::new(),
            }),
        })
    }

    fn schedule(&self, task: Runnable) -> TaskHandle {
        let Some(cell) = self.core.tasks.register(task, false) else {
            return TaskHandle::DISPOSED;
        };
        let job = run_once(&cell);
        Core::accept(cell, self.core.executor.execute(job))
    }

    fn schedule_delayed(&self, task: Runnable, delay: Duration) -> TaskHandle {
        if !self.core.capabilities.supports_delay() {
            return TaskHandle::NOT_TIMED;
        }
        let Some(cell) = self.core.tasks.register(task, false) else {
            return TaskHandle::DISPOSED;
        };
        let job = run_once(&cell);
        Core::accept(cell, self.core.executor.execute_after(job, delay))
    }

    fn schedule_periodically(
        &self,
        task: Runnable,
        initial_delay: Duration,
        period: Duration,
    ) -> TaskHandle {
        if !self.core.capabilities.supports_periodic() {
            return TaskHandle::NOT_TIMED;
        }
        if period.is_zero() {
            return TaskHandle::refused(RejectedExecution::InvalidPeriod);
        }
        let Some(cell) = self.core.tasks.register(task, true) else {
            return TaskHandle::DISPOSED;
        };

        let target = JobTarget::new(&cell);
        let job: RepeatingJob = Box::new(move || {
            target.get().is_some_and(|cell| {
                cell.run();
                !cell.is_disposed()
            })
        });
        Core::accept(
            cell,
            self.core
                .executor
                .execute_at_fixed_rate(job, initial_delay, period),
        )
    }
}

impl Disposable for ExecutorScheduler {
    fn dispose(&self) {
        if !self.core.tasks.dispose() {
            return;
        }
        if self.core.ownership == Ownership::Owned {
            self.core.executor.shutdown();
        }
        info!(ownership = ?self.core.ownership, "Executor scheduler disposed");
    }

    fn is_disposed(&self) -> bool {
        self.core.tasks.is_disposed()
    }
}

impl Drop for ExecutorScheduler {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl fmt::Debug for ExecutorScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutorScheduler")
            .field("capabilities", &self.core.capabilities)
            .field("ownership", &self.core.ownership)
            .field("disposed", &self.is_disposed())
            .finish_non_exhaustive()
    }
}

/// The cell a facility job acts on.
///
/// Jobs hold cells weakly so a disposed task is freed even while its job is
/// still queued. A job the facility drops without running it (refused at fire
/// time, discarded on shutdown, or cancelled with its runtime) disposes the
/// cell, so the handle never keeps reporting `Pending` for work that is gone.
struct JobTarget {
    cell: Weak<TaskCell>,
    settled: bool,
}

impl JobTarget {
    fn new(cell: &Arc<TaskCell>) -> Self {
        Self {
            cell: Arc::downgrade(cell),
            settled: false,
        }
    }

    fn get(&self) -> Option<Arc<TaskCell>> {
        self.cell.upgrade()
    }

    /// Hand the cell over for good; dropping the job no longer disposes it.
    fn take(&mut self) -> Option<Arc<TaskCell>> {
        self.settled = true;
        self.cell.upgrade()
    }
}

impl Drop for JobTarget {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        if let Some(cell) = self.cell.upgrade() {
            if !cell.is_disposed() {
                debug!(task_id = cell.id(), "Facility dropped job; task disposed");
            }
            cell.dispose();
        }
    }
}

/// A facility job that runs `cell` once, unless it was released meanwhile.
fn run_once(cell: &Arc<TaskCell>) -> Job {
    let mut target = JobTarget::new(cell);
    Box::new(move || {
        if let Some(cell) = target.take() {
            cell.run();
        }
    })
}

/// The job that drains a worker lane.
///
/// Nothing else would drain the lane, so a drain the facility drops unrun
/// disposes the worker.
struct LaneDrain {
    worker: Arc<WorkerShared>,
    ran: bool,
}

impl LaneDrain {
    fn run(mut self) {
        self.ran = true;
        self.worker.lane.drain();
    }
}

impl Drop for LaneDrain {
    fn drop(&mut self) {
        if !self.ran && self.worker.tasks.dispose() {
            debug!("Worker drain dropped unrun; worker disposed");
        }
    }
}

struct WorkerShared {
    core: Arc<Core>,
    tasks: Arc<TaskTracker>,
    lane: SerialLane,
}

impl WorkerShared {
    /// Queue `cell` on the lane, starting a drain job if the lane was idle.
    ///
    /// A lane whose drain cannot be submitted would never run again, so the
    /// worker is disposed when that happens.
    fn enqueue(self: &Arc<Self>, cell: Arc<TaskCell>) -> Result<(), RejectedExecution> {
        if !self.lane.push(cell) {
            return Ok(());
        }
        let drain = LaneDrain {
            worker: Arc::clone(self),
            ran: false,
        };
        let drain: Job = Box::new(move || drain.run());
        self.core.executor.execute(drain).inspect_err(|reason| {
            self.tasks.dispose();
            warn!(%reason, "Executor refused worker drain; worker disposed");
        })
    }
}

struct ExecutorWorker {
    shared: Arc<WorkerShared>,
}

impl Worker for ExecutorWorker {
    fn schedule(&self, task: Runnable) -> TaskHandle {
        let Some(cell) = self.shared.tasks.register(task, false) else {
            return TaskHandle::DISPOSED;
        };
        let queued = self.shared.enqueue(Arc::clone(&cell));
        Core::accept(cell, queued)
    }

    fn schedule_delayed(&self, task: Runnable, delay: Duration) -> TaskHandle {
        if !self.shared.core.capabilities.supports_delay() {
            return TaskHandle::NOT_TIMED;
        }
        let Some(cell) = self.shared.tasks.register(task, false) else {
            return TaskHandle::DISPOSED;
        };

        let mut target = JobTarget::new(&cell);
        let worker = Arc::downgrade(&self.shared);
        let job: Job = Box::new(move || {
            let Some(worker) = worker.upgrade() else {
                return;
            };
            let Some(cell) = target.take() else {
                return;
            };
            if !cell.is_pending() {
                return;
            }
            // A refused drain has already disposed the worker and this task.
            if let Err(reason) = worker.enqueue(cell) {
                debug!(%reason, "Delayed task not queued on worker");
            }
        });
        Core::accept(cell, self.shared.core.executor.execute_after(job, delay))
    }

    fn schedule_periodically(
        &self,
        task: Runnable,
        initial_delay: Duration,
        period: Duration,
    ) -> TaskHandle {
        if !self.shared.core.capabilities.supports_periodic() {
            return TaskHandle::NOT_TIMED;
        }
        if period.is_zero() {
            return TaskHandle::refused(RejectedExecution::InvalidPeriod);
        }
        let Some(cell) = self.shared.tasks.register(task, true) else {
            return TaskHandle::DISPOSED;
        };

        let target = JobTarget::new(&cell);
        let worker: Weak<WorkerShared> = Arc::downgrade(&self.shared);
        let job: RepeatingJob = Box::new(move || {
            let (Some(cell), Some(worker)) = (target.get(), worker.upgrade()) else {
                return false;
            };
            if cell.is_disposed() {
                return false;
            }
            // A tick still running or still queued on the lane skips this slot.
            if !cell.is_pending() || !cell.mark_queued() {
                return true;
            }
            worker.enqueue(cell).is_ok()
        });
        Core::accept(
            cell,
            self.shared
                .core
                .executor
                .execute_at_fixed_rate(job, initial_delay, period),
        )
    }
}

impl Disposable for ExecutorWorker {
    fn dispose(&self) {
        if self.shared.tasks.dispose() {
            debug!("Worker disposed");
        }
    }

    fn is_disposed(&self) -> bool {
        self.shared.tasks.is_disposed()
    }
}

impl Drop for ExecutorWorker {
    fn drop(&mut self) {
        self.dispose();
    }
}
