//! Scheduler selection configuration.

use serde::{Deserialize, Serialize};

use super::executor::{ExecutorConfig, DEFAULT_THREAD_NAME_PREFIX};

/// Which scheduling strategy to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerKind {
    /// Run on the calling thread.
    Immediate,
    /// One dedicated background thread.
    Single,
    /// A pool of threads with an unbounded queue.
    #[default]
    Parallel,
    /// A pool of threads with a bounded queue.
    Bounded,
}

impl std::str::FromStr for SchedulerKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "immediate" => Ok(Self::Immediate),
            "single" => Ok(Self::Single),
            "parallel" => Ok(Self::Parallel),
            "bounded" => Ok(Self::Bounded),
            other => Err(format!("unknown scheduler kind `{other}`")),
        }
    }
}

/// Root scheduler configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Strategy to build.
    pub kind: SchedulerKind,
    /// Thread count for `parallel` and `bounded`. Defaults to the CPU count.
    pub threads: Option<usize>,
    /// Queue bound. Required for `bounded`, allowed for `single`.
    pub queue_capacity: Option<usize>,
    /// Whether thread-backed schedulers support delayed and periodic work.
    pub timer: bool,
    /// Prefix for thread names.
    pub thread_name_prefix: String,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            kind: SchedulerKind::default(),
            threads: None,
            queue_capacity: None,
            timer: true,
            thread_name_prefix: DEFAULT_THREAD_NAME_PREFIX.to_string(),
        }
    }
}

impl SchedulerConfig {
    /// Validate the combination of fields.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        if self.threads == Some(0) {
            return Err("threads must be greater than 0 when set".into());
        }
        if self.queue_capacity == Some(0) {
            return Err("queue_capacity must be greater than 0 when set".into());
        }
        match self.kind {
            SchedulerKind::Single if self.threads.is_some_and(|t| t != 1) => {
                Err("single scheduler runs exactly one thread".into())
            }
            SchedulerKind::Parallel if self.queue_capacity.is_some() => {
                Err("parallel scheduler is unbounded; use `bounded` for a queue limit".into())
            }
            SchedulerKind::Bounded if self.queue_capacity.is_none() => {
                Err("bounded scheduler requires queue_capacity".into())
            }
            _ => Ok(()),
        }
    }

    /// Parse scheduler configuration from a JSON string and validate.
    ///
    /// # Errors
    ///
    /// Returns a parse or validation message.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Read configuration from the process environment, loading `.env` first.
    ///
    /// Recognised variables: `SCHEDULER_KIND`, `SCHEDULER_THREADS`,
    /// `SCHEDULER_QUEUE_CAPACITY`, `SCHEDULER_TIMER`,
    /// `SCHEDULER_THREAD_NAME_PREFIX`. Unset variables keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns a message naming the variable that failed to parse or validate.
    pub fn from_env() -> Result<Self, String> {
        // A missing .env file is not an error.
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Same as [`SchedulerConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();
        if let Some(kind) = lookup("SCHEDULER_KIND") {
            cfg.kind = kind.parse().map_err(|e| format!("SCHEDULER_KIND: {e}"))?;
        }
        if let Some(threads) = lookup("SCHEDULER_THREADS") {
            cfg.threads = Some(parse_var("SCHEDULER_THREADS", &threads)?);
        }
        if let Some(capacity) = lookup("SCHEDULER_QUEUE_CAPACITY") {
            cfg.queue_capacity = Some(parse_var("SCHEDULER_QUEUE_CAPACITY", &capacity)?);
        }
        if let Some(timer) = lookup("SCHEDULER_TIMER") {
            cfg.timer = parse_var("SCHEDULER_TIMER", &timer)?;
        }
        if let Some(prefix) = lookup("SCHEDULER_THREAD_NAME_PREFIX") {
            cfg.thread_name_prefix = prefix;
        }
        cfg.validate()?;
        Ok(cfg)
    }

    /// Thread pool settings for thread-backed kinds; `None` for `immediate`.
    #[must_use]
    pub fn executor_config(&self) -> Option<ExecutorConfig> {
        let threads = match self.kind {
            SchedulerKind::Immediate => return None,
            SchedulerKind::Single => 1,
            SchedulerKind::Parallel | SchedulerKind::Bounded => {
                self.threads.unwrap_or_else(num_cpus::get)
            }
        };
        let mut config = ExecutorConfig::new()
            .with_threads(threads)
            .with_timer(self.timer)
            .with_thread_name_prefix(self.thread_name_prefix.clone());
        if let Some(capacity) = self.queue_capacity {
            config = config.with_queue_capacity(capacity);
        }
        Some(config)
    }
}

fn parse_var<T>(name: &str, value: &str) -> Result<T, String>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| format!("{name}: invalid value `{value}`: {e}"))
}
