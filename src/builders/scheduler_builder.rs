//! Build a scheduler from [`SchedulerConfig`].

use std::sync::Arc;

use tracing::info;

use crate::config::{SchedulerConfig, SchedulerKind};
use crate::core::{schedulers, Scheduler, SchedulerError};

/// Validate `cfg` and start the scheduler it describes.
///
/// Thread-backed kinds own their pool; disposing or dropping the returned
/// scheduler shuts the pool down.
///
/// # Errors
///
/// `SchedulerError::InvalidConfig` when validation fails,
/// `SchedulerError::ThreadSpawn` if pool threads cannot be started.
pub fn build_scheduler(cfg: &SchedulerConfig) -> Result<Arc<dyn Scheduler>, SchedulerError> {
    cfg.validate()
        .map_err(|e| SchedulerError::InvalidConfig(format!("config invalid: {e}")))?;

    let scheduler: Arc<dyn Scheduler> = match cfg.executor_config() {
        None => Arc::new(schedulers::immediate()),
        Some(executor_cfg) => Arc::new(schedulers::from_config(executor_cfg)?),
    };

    info!(
        kind = ?cfg.kind,
        threads = ?cfg.threads,
        timer = cfg.timer && cfg.kind != SchedulerKind::Immediate,
        "Scheduler built from configuration"
    );
    Ok(scheduler)
}
