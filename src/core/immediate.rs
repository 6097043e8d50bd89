//! Scheduler that runs work on the calling thread.
//!
//! Direct submissions run before `schedule` returns. Worker submissions go
//! through a [`SerialLane`], so a task that schedules onto its own worker
//! queues the nested task behind itself instead of recursing.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use super::disposable::{Disposable, TaskHandle};
use super::lane::SerialLane;
use super::scheduler::{Capabilities, Scheduler, Worker};
use super::task::{Runnable, TaskTracker};

/// Runs every task inline. Delayed and periodic work is not supported.
pub struct ImmediateScheduler {
    tasks: Arc<TaskTracker>,
}

impl ImmediateScheduler {
    /// Create a scheduler that is not disposed.
    #[must_use]
    pub fn new() -> Self {
        Self {
            tasks: TaskTracker::new(),
        }
    }
}

impl Default for ImmediateScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for ImmediateScheduler {
    fn capabilities(&self) -> Capabilities {
        Capabilities::IMMEDIATE
    }

    fn create_worker(&self) -> Box<dyn Worker> {
        Box::new(ImmediateWorker {
            tasks: self.tasks.child(),
            lane: SerialLane::new(),
        })
    }

    fn schedule(&self, task: Runnable) -> TaskHandle {
        let Some(cell) = self.tasks.register(task, false) else {
            return TaskHandle::DISPOSED;
        };
        cell.run();
        TaskHandle::from_cell(cell)
    }

    fn schedule_delayed(&self, _task: Runnable, _delay: Duration) -> TaskHandle {
        TaskHandle::NOT_TIMED
    }

    fn schedule_periodically(
        &self,
        _task: Runnable,
        _initial_delay: Duration,
        _period: Duration,
    ) -> TaskHandle {
        TaskHandle::NOT_TIMED
    }
}

impl Disposable for ImmediateScheduler {
    fn dispose(&self) {
        if self.tasks.dispose() {
            debug!("Immediate scheduler disposed");
        }
    }

    fn is_disposed(&self) -> bool {
        self.tasks.is_disposed()
    }
}

impl Drop for ImmediateScheduler {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl fmt::Debug for ImmediateScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImmediateScheduler")
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

struct ImmediateWorker {
    tasks: Arc<TaskTracker>,
    lane: SerialLane,
}

impl Worker for ImmediateWorker {
    fn schedule(&self, task: Runnable) -> TaskHandle {
        let Some(cell) = self.tasks.register(task, false) else {
            return TaskHandle::DISPOSED;
        };
        if self.lane.push(Arc::clone(&cell)) {
            self.lane.drain();
        }
        TaskHandle::from_cell(cell)
    }

    fn schedule_delayed(&self, _task: Runnable, _delay: Duration) -> TaskHandle {
        TaskHandle::NOT_TIMED
    }

    fn schedule_periodically(
        &self,
        _task: Runnable,
        _initial_delay: Duration,
        _period: Duration,
    ) -> TaskHandle {
        TaskHandle::NOT_TIMED
    }
}

impl Disposable for ImmediateWorker {
    fn dispose(&self) {
        self.tasks.dispose();
    }

    fn is_disposed(&self) -> bool {
        self.tasks.is_disposed()
    }
}

impl Drop for ImmediateWorker {
    fn drop(&mut self) {
        self.dispose();
    }
}
