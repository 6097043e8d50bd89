//! Configuration models for execution facilities and scheduler selection.

pub mod executor;
pub mod scheduler;

pub use executor::{ExecutorConfig, DEFAULT_THREAD_NAME_PREFIX, DEFAULT_THREAD_STACK_SIZE};
pub use scheduler::{SchedulerConfig, SchedulerKind};
