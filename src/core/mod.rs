//! Scheduling contracts, task lifecycle, and the built-in strategies.

pub mod disposable;
pub mod error;
pub mod executor;
pub mod executor_scheduler;
pub mod hooks;
pub mod immediate;
pub mod scheduler;
pub mod schedulers;
pub mod task;
pub mod thread_pool;

mod lane;

pub use disposable::{Disposable, TaskHandle, TaskState};
pub use error::{AppResult, RejectedExecution, Rejection, SchedulerError};
pub use executor::{Executor, Job, RepeatingJob};
pub use executor_scheduler::{ExecutorScheduler, Ownership};
pub use hooks::{failure_hook_installed, set_failure_hook, TaskFailure};
pub use immediate::ImmediateScheduler;
pub use scheduler::{Capabilities, Scheduler, Worker};
pub use task::Runnable;
pub use thread_pool::{ExecutorStats, ThreadPoolExecutor};
