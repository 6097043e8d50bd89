//! Process-wide sink for failures raised by scheduled tasks.
//!
//! A task that panics never unwinds into the execution facility's thread. The
//! task wrapper catches the panic and hands a [`TaskFailure`] to the hook
//! installed with [`set_failure_hook`], or logs it with `tracing::error!` when
//! no hook was installed.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::OnceLock;
use std::thread;

use tracing::error;

use super::error::SchedulerError;

/// Description of a task that panicked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskFailure {
    /// Process-unique id of the failed task.
    pub task_id: u64,
    /// Name of the thread the task ran on, if it had one.
    pub thread: Option<String>,
    /// Panic message.
    pub message: String,
}

impl TaskFailure {
    pub(crate) fn from_panic(task_id: u64, payload: &(dyn Any + Send)) -> Self {
        Self {
            task_id,
            thread: thread::current().name().map(str::to_owned),
            message: panic_message(payload),
        }
    }
}

impl fmt::Display for TaskFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "task {} failed on {}: {}",
            self.task_id,
            self.thread.as_deref().unwrap_or("<unnamed>"),
            self.message
        )
    }
}

type FailureHook = Box<dyn Fn(&TaskFailure) + Send + Sync + 'static>;

static FAILURE_HOOK: OnceLock<FailureHook> = OnceLock::new();

/// Install the process-wide failure hook.
///
/// Meant to be called once at process start, before any scheduler runs work.
///
/// # Errors
///
/// Returns `SchedulerError::HookAlreadySet` if a hook was installed before.
pub fn set_failure_hook<F>(hook: F) -> Result<(), SchedulerError>
where
    F: Fn(&TaskFailure) + Send + Sync + 'static,
{
    FAILURE_HOOK
        .set(Box::new(hook))
        .map_err(|_| SchedulerError::HookAlreadySet)
}

/// Whether a custom failure hook has been installed.
#[must_use]
pub fn failure_hook_installed() -> bool {
    FAILURE_HOOK.get().is_some()
}

pub(crate) fn report(failure: &TaskFailure) {
    let Some(hook) = FAILURE_HOOK.get() else {
        error!(
            task_id = failure.task_id,
            thread = failure.thread.as_deref().unwrap_or("<unnamed>"),
            message = %failure.message,
            "Uncaught failure in scheduled task"
        );
        return;
    };
    if panic::catch_unwind(AssertUnwindSafe(|| hook(failure))).is_err() {
        error!(task_id = failure.task_id, "Failure hook panicked while reporting");
    }
}

/// Best-effort extraction of a panic payload's message.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
