//! Error types for scheduler construction and task submission.

use thiserror::Error;

/// Errors produced while building schedulers and execution facilities.
///
/// Scheduling calls themselves never return these; they report expected
/// failures through a rejected [`TaskHandle`](crate::core::TaskHandle).
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Configuration failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// An OS thread could not be spawned for an execution facility.
    #[error("failed to spawn thread: {0}")]
    ThreadSpawn(#[from] std::io::Error),
    /// A runtime adapter could not be created or located.
    #[error("runtime error: {0}")]
    Runtime(String),
    /// The process-wide failure hook was already installed.
    #[error("failure hook already set")]
    HookAlreadySet,
}

/// Reason an execution facility refused a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RejectedExecution {
    /// The facility has been shut down.
    #[error("executor is shut down")]
    Shutdown,
    /// The facility's queue is full.
    #[error("executor queue is saturated")]
    Saturated,
    /// The facility does not implement the requested kind of submission.
    #[error("submission kind not supported by executor")]
    Unsupported,
    /// A periodic submission was made with a zero period.
    #[error("period must be greater than zero")]
    InvalidPeriod,
}

/// Why a scheduling request produced no running task.
///
/// Every variant is carried by an already-disposed handle, so callers may
/// ignore the distinction and treat all handles uniformly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Rejection {
    /// The scheduler cannot honor delayed or periodic submission at all.
    #[error("scheduler does not support timed submission")]
    NotTimed,
    /// The underlying facility refused this particular submission.
    #[error("submission refused: {0}")]
    Refused(RejectedExecution),
    /// The scheduler or worker was disposed before the call.
    #[error("scheduler or worker has been disposed")]
    Disposed,
}

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;
