//! Cancellation handles returned by every scheduling operation.

use std::fmt;
use std::sync::Arc;

use super::error::{RejectedExecution, Rejection};
use super::task::TaskCell;

/// Something that can be cancelled.
///
/// `dispose` is idempotent, thread-safe and never blocks waiting for running
/// work to finish.
pub trait Disposable {
    /// Request cancellation.
    fn dispose(&self);

    /// Whether cancellation was requested or the work can no longer run.
    fn is_disposed(&self) -> bool;
}

/// Observable lifecycle state of a scheduled task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// Waiting to run (or re-armed between periodic ticks).
    Pending,
    /// Currently executing on a facility thread.
    Running,
    /// Cancelled, or never accepted.
    Cancelled,
    /// A one-shot task that ran to completion.
    Finished,
}

#[derive(Clone)]
enum Inner {
    Task(Arc<TaskCell>),
    Rejected(Rejection),
}

/// Handle to one scheduling request.
///
/// Either tracks an accepted task or carries the [`Rejection`] that stopped
/// it. Rejected handles are permanently disposed and do nothing, so callers
/// that do not care why can treat all handles alike.
///
/// Dropping a handle does not cancel the task.
#[derive(Clone)]
#[must_use = "a TaskHandle is the only way to cancel the scheduled task"]
pub struct TaskHandle {
    inner: Inner,
}

impl TaskHandle {
    /// Returned for delayed or periodic requests on a scheduler without timer
    /// support.
    pub const NOT_TIMED: Self = Self::rejected(Rejection::NotTimed);

    /// Returned for requests made after the scheduler or worker was disposed.
    pub const DISPOSED: Self = Self::rejected(Rejection::Disposed);

    /// A handle that carries `rejection` and never runs anything.
    pub const fn rejected(rejection: Rejection) -> Self {
        Self {
            inner: Inner::Rejected(rejection),
        }
    }

    pub(crate) const fn refused(reason: RejectedExecution) -> Self {
        Self::rejected(Rejection::Refused(reason))
    }

    pub(crate) fn from_cell(cell: Arc<TaskCell>) -> Self {
        Self {
            inner: Inner::Task(cell),
        }
    }

    /// Why the request was not accepted, if it was not.
    #[must_use]
    pub const fn rejection(&self) -> Option<Rejection> {
        match &self.inner {
            Inner::Task(_) => None,
            Inner::Rejected(rejection) => Some(*rejection),
        }
    }

    /// Whether the request was rejected for any reason.
    #[must_use]
    pub const fn is_rejected(&self) -> bool {
        matches!(self.inner, Inner::Rejected(_))
    }

    /// Whether this is the capability sentinel, [`TaskHandle::NOT_TIMED`].
    #[must_use]
    pub const fn is_not_timed(&self) -> bool {
        matches!(self.inner, Inner::Rejected(Rejection::NotTimed))
    }

    /// Convert into a `Result`, keeping accepted handles.
    ///
    /// # Errors
    ///
    /// Returns the rejection carried by a rejected handle.
    pub fn accepted(self) -> Result<Self, Rejection> {
        match self.inner {
            Inner::Rejected(rejection) => Err(rejection),
            Inner::Task(_) => Ok(self),
        }
    }

    /// Current lifecycle state. Rejected handles report `Cancelled`.
    #[must_use]
    pub fn state(&self) -> TaskState {
        match &self.inner {
            Inner::Task(cell) => cell.state(),
            Inner::Rejected(_) => TaskState::Cancelled,
        }
    }

    /// Process-unique id of the accepted task.
    #[must_use]
    pub fn task_id(&self) -> Option<u64> {
        match &self.inner {
            Inner::Task(cell) => Some(cell.id()),
            Inner::Rejected(_) => None,
        }
    }
}

impl Disposable for TaskHandle {
    fn dispose(&self) {
        if let Inner::Task(cell) = &self.inner {
            cell.dispose();
        }
    }

    fn is_disposed(&self) -> bool {
        match &self.inner {
            Inner::Task(cell) => cell.is_disposed(),
            Inner::Rejected(_) => true,
        }
    }
}

impl fmt::Debug for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.inner {
            Inner::Task(cell) => f.debug_tuple("TaskHandle").field(cell).finish(),
            Inner::Rejected(rejection) => f
                .debug_tuple("TaskHandle::Rejected")
                .field(rejection)
                .finish(),
        }
    }
}
