//! Configuration for the built-in thread pool facility.

use serde::{Deserialize, Serialize};

/// Default stack size for pool threads (2 MiB).
pub const DEFAULT_THREAD_STACK_SIZE: usize = 2 * 1024 * 1024;

/// Default prefix for pool thread names.
pub const DEFAULT_THREAD_NAME_PREFIX: &str = "prometheus-scheduler";

/// Settings for a [`ThreadPoolExecutor`](crate::core::ThreadPoolExecutor).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Number of worker threads.
    pub threads: usize,
    /// Job queue bound. `None` means unbounded.
    pub queue_capacity: Option<usize>,
    /// Whether to run a timer thread for delayed and periodic jobs.
    pub timer: bool,
    /// Prefix for thread names (`{prefix}-{n}`, `{prefix}-timer`).
    pub thread_name_prefix: String,
    /// Stack size for worker threads, in bytes.
    pub thread_stack_size: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            threads: 1,
            queue_capacity: None,
            timer: true,
            thread_name_prefix: DEFAULT_THREAD_NAME_PREFIX.to_string(),
            thread_stack_size: DEFAULT_THREAD_STACK_SIZE,
        }
    }
}

impl ExecutorConfig {
    /// Single-threaded, unbounded, timer-capable defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of worker threads.
    #[must_use]
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    /// Bound the job queue.
    #[must_use]
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = Some(capacity);
        self
    }

    /// Enable or disable the timer thread.
    #[must_use]
    pub fn with_timer(mut self, timer: bool) -> Self {
        self.timer = timer;
        self
    }

    /// Set the thread name prefix.
    #[must_use]
    pub fn with_thread_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.thread_name_prefix = prefix.into();
        self
    }

    /// Set the worker thread stack size.
    #[must_use]
    pub fn with_thread_stack_size(mut self, bytes: usize) -> Self {
        self.thread_stack_size = bytes;
        self
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        if self.threads == 0 {
            return Err("threads must be greater than 0".into());
        }
        if self.queue_capacity == Some(0) {
            return Err("queue_capacity must be greater than 0 when set".into());
        }
        if self.thread_name_prefix.is_empty() {
            return Err("thread_name_prefix must not be empty".into());
        }
        if self.thread_stack_size == 0 {
            return Err("thread_stack_size must be greater than 0".into());
        }
        Ok(())
    }
}
