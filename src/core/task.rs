//! Task wrapper state machine and the composite tracker that owns wrappers.
//!
//! A [`TaskCell`] moves through `PENDING -> RUNNING -> FINISHED` for one-shot
//! work, and `PENDING -> RUNNING -> PENDING` for each periodic tick. Every
//! transition is a compare-and-swap on a single atomic byte; the user closure
//! is taken out of its slot before it runs, so no lock is held while user code
//! executes.
//!
//! A [`TaskTracker`] owns the cells a scheduler or worker still considers
//! outstanding. Disposing a tracker cancels everything it owns and every child
//! tracker created from it.

use std::collections::HashMap;
use std::fmt;
use std::mem;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use super::disposable::TaskState;
use super::hooks::{self, TaskFailure};

/// A user-supplied unit of work.
///
/// `FnMut` so the same closure can be invoked once per periodic tick.
pub type Runnable = Box<dyn FnMut() + Send + 'static>;

const PENDING: u8 = 0;
const RUNNING: u8 = 1;
const CANCELLED: u8 = 2;
const FINISHED: u8 = 3;
/// Latched on top of `RUNNING` when dispose races with an in-flight run.
const CANCEL_REQUESTED: u8 = 0b100;

static NEXT_TASK_ID: AtomicU64 = AtomicU64::new(1);

/// One scheduled unit of work and its lifecycle state.
pub(crate) struct TaskCell {
    id: u64,
    periodic: bool,
    state: AtomicU8,
    /// Set while the cell sits on a worker lane waiting to run.
    queued: AtomicBool,
    task: Mutex<Option<Runnable>>,
    tracker: Weak<TaskTracker>,
}

impl TaskCell {
    fn new(task: Runnable, periodic: bool, tracker: Weak<TaskTracker>) -> Self {
        Self {
            id: NEXT_TASK_ID.fetch_add(1, Ordering::Relaxed),
            periodic,
            state: AtomicU8::new(PENDING),
            queued: AtomicBool::new(false),
            task: Mutex::new(Some(task)),
            tracker,
        }
    }

    pub(crate) const fn id(&self) -> u64 {
        self.id
    }

    pub(crate) fn is_pending(&self) -> bool {
        self.state.load(Ordering::Acquire) == PENDING
    }

    /// Mark the cell as queued on a lane.
    ///
    /// Returns `false` if it was already queued and has not started since.
    pub(crate) fn mark_queued(&self) -> bool {
        !self.queued.swap(true, Ordering::AcqRel)
    }

    pub(crate) fn state(&self) -> TaskState {
        match self.state.load(Ordering::Acquire) {
            PENDING => TaskState::Pending,
            CANCELLED => TaskState::Cancelled,
            FINISHED => TaskState::Finished,
            _ => TaskState::Running,
        }
    }

    /// True once the cell will never run again, or a cancel has been latched.
    pub(crate) fn is_disposed(&self) -> bool {
        !matches!(self.state.load(Ordering::Acquire), PENDING | RUNNING)
    }

    /// Run the task if it is still pending.
    ///
    /// Called from an execution facility's thread. A cell that lost the race
    /// against `dispose`, or whose previous tick is still running, returns
    /// without touching the user closure.
    pub(crate) fn run(&self) {
        self.queued.store(false, Ordering::Release);
        if self
            .state
            .compare_exchange(PENDING, RUNNING, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }

        let taken = self.task.lock().take();
        let Some(mut task) = taken else {
            self.state.store(FINISHED, Ordering::Release);
            self.detach();
            return;
        };

        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| task())) {
            hooks::report(&TaskFailure::from_panic(self.id, payload.as_ref()));
        }

        if self.periodic {
            // The closure goes back before re-arming so the next tick finds it.
            *self.task.lock() = Some(task);
            if self
                .state
                .compare_exchange(RUNNING, PENDING, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                return;
            }
            self.state.store(CANCELLED, Ordering::Release);
            self.release();
        } else {
            self.state.store(FINISHED, Ordering::Release);
            drop(task);
            self.detach();
        }
    }

    /// Request cancellation. Idempotent and non-blocking.
    pub(crate) fn dispose(&self) {
        let mut current = self.state.load(Ordering::Acquire);
        loop {
            let next = match current {
                PENDING => CANCELLED,
                RUNNING => RUNNING | CANCEL_REQUESTED,
                _ => return,
            };
            match self.state.compare_exchange_weak(
                current,
                next,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    if next == CANCELLED {
                        self.release();
                    }
                    return;
                }
                Err(actual) => current = actual,
            }
        }
    }

    fn release(&self) {
        let task = self.task.lock().take();
        drop(task);
        self.detach();
    }

    fn detach(&self) {
        if let Some(tracker) = self.tracker.upgrade() {
            tracker.remove(self.id);
        }
    }
}

impl fmt::Debug for TaskCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskCell")
            .field("id", &self.id)
            .field("periodic", &self.periodic)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

#[derive(Default)]
struct TrackerState {
    disposed: bool,
    tasks: HashMap<u64, Arc<TaskCell>>,
    children: Vec<Weak<TaskTracker>>,
}

/// Composite of outstanding cells owned by one scheduler or worker.
#[derive(Default)]
pub(crate) struct TaskTracker {
    inner: Mutex<TrackerState>,
}

impl TaskTracker {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Create a tracker that is disposed together with this one.
    ///
    /// A child of an already-disposed tracker starts out disposed.
    pub(crate) fn child(&self) -> Arc<Self> {
        let child = Self::new();
        let mut inner = self.inner.lock();
        if inner.disposed {
            child.inner.lock().disposed = true;
        } else {
            inner.children.retain(|c| c.strong_count() > 0);
            inner.children.push(Arc::downgrade(&child));
        }
        drop(inner);
        child
    }

    /// Wrap `task` in a cell owned by this tracker.
    ///
    /// Returns `None` once the tracker is disposed.
    pub(crate) fn register(self: &Arc<Self>, task: Runnable, periodic: bool) -> Option<Arc<TaskCell>> {
        let cell = Arc::new(TaskCell::new(task, periodic, Arc::downgrade(self)));
        let mut inner = self.inner.lock();
        if inner.disposed {
            drop(inner);
            return None;
        }
        inner.tasks.insert(cell.id(), Arc::clone(&cell));
        drop(inner);
        Some(cell)
    }

    fn remove(&self, id: u64) {
        let removed = self.inner.lock().tasks.remove(&id);
        drop(removed);
    }

    /// Cancel every owned cell and child tracker, and refuse future work.
    ///
    /// Returns `false` if the tracker was already disposed.
    pub(crate) fn dispose(&self) -> bool {
        let (tasks, children) = {
            let mut inner = self.inner.lock();
            if inner.disposed {
                return false;
            }
            inner.disposed = true;
            (mem::take(&mut inner.tasks), mem::take(&mut inner.children))
        };
        for child in children {
            if let Some(child) = child.upgrade() {
                child.dispose();
            }
        }
        for cell in tasks.into_values() {
            cell.dispose();
        }
        true
    }

    pub(crate) fn is_disposed(&self) -> bool {
        self.inner.lock().disposed
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.inner.lock().tasks.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counting_task(counter: &Arc<AtomicUsize>) -> Runnable {
        let counter = Arc::clone(counter);
        Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn test_one_shot_runs_once() {
        let tracker = TaskTracker::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let cell = tracker.register(counting_task(&counter), false).unwrap();

        assert_eq!(cell.state(), TaskState::Pending);
        cell.run();
        cell.run();

        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(cell.state(), TaskState::Finished);
        assert!(cell.is_disposed());
        assert_eq!(tracker.len(), 0);
    }

    #[test]
    fn test_dispose_before_run_prevents_invocation() {
        let tracker = TaskTracker::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let cell = tracker.register(counting_task(&counter), false).unwrap();

        cell.dispose();
        cell.dispose();
        cell.run();

        assert_eq!(counter.load(Ordering::SeqCst), 0);
        assert_eq!(cell.state(), TaskState::Cancelled);
        assert_eq!(tracker.len(), 0);
    }

    #[test]
    fn test_periodic_rearms_after_tick() {
        let tracker = TaskTracker::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let cell = tracker.register(counting_task(&counter), true).unwrap();

        cell.run();
        assert_eq!(cell.state(), TaskState::Pending);
        cell.run();
        assert_eq!(counter.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.len(), 1);

        cell.dispose();
        cell.run();
        assert_eq!(counter.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.len(), 0);
    }

    #[test]
    fn test_cancel_during_periodic_tick_is_latched() {
        let tracker = TaskTracker::new();
        let slot: Arc<Mutex<Option<Arc<TaskCell>>>> = Arc::new(Mutex::new(None));
        let ticks = Arc::new(AtomicUsize::new(0));

        let observed: Arc<Mutex<Option<(TaskState, bool)>>> = Arc::new(Mutex::new(None));

        let inner_slot = Arc::clone(&slot);
        let inner_ticks = Arc::clone(&ticks);
        let inner_observed = Arc::clone(&observed);
        let cell = tracker
            .register(
                Box::new(move || {
                    inner_ticks.fetch_add(1, Ordering::SeqCst);
                    let me = inner_slot.lock().take();
                    if let Some(me) = me {
                        me.dispose();
                        *inner_observed.lock() = Some((me.state(), me.is_disposed()));
                    }
                }),
                true,
            )
            .unwrap();
        *slot.lock() = Some(Arc::clone(&cell));

        cell.run();
        cell.run();

        // Latched while running, terminal once the tick returned.
        assert_eq!(*observed.lock(), Some((TaskState::Running, true)));
        assert_eq!(ticks.load(Ordering::SeqCst), 1);
        assert_eq!(cell.state(), TaskState::Cancelled);
    }

    #[test]
    fn test_queued_mark_clears_when_run_starts() {
        let tracker = TaskTracker::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let cell = tracker.register(counting_task(&counter), true).unwrap();

        assert!(cell.mark_queued());
        assert!(!cell.mark_queued());
        cell.run();
        assert!(cell.mark_queued());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_panic_still_completes_lifecycle() {
        let tracker = TaskTracker::new();
        let cell = tracker
            .register(Box::new(|| panic!("task failure under test")), false)
            .unwrap();

        cell.run();

        assert_eq!(cell.state(), TaskState::Finished);
        assert_eq!(tracker.len(), 0);
    }

    #[test]
    fn test_tracker_dispose_cancels_tasks_and_children() {
        let parent = TaskTracker::new();
        let child = parent.child();
        let counter = Arc::new(AtomicUsize::new(0));

        let direct = parent.register(counting_task(&counter), false).unwrap();
        let nested = child.register(counting_task(&counter), true).unwrap();

        assert!(parent.dispose());
        assert!(!parent.dispose());

        direct.run();
        nested.run();
        assert_eq!(counter.load(Ordering::SeqCst), 0);
        assert!(child.is_disposed());
        assert!(parent.register(counting_task(&counter), false).is_none());
        assert!(child.register(counting_task(&counter), false).is_none());
    }

    #[test]
    fn test_child_of_disposed_tracker_is_disposed() {
        let parent = TaskTracker::new();
        parent.dispose();
        let child = parent.child();
        assert!(child.is_disposed());
    }
}
