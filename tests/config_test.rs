//! Tests for configuration parsing, validation, and scheduler construction.

use prometheus_scheduler::config::{ExecutorConfig, SchedulerConfig, SchedulerKind};
use prometheus_scheduler::{
    build_scheduler, AppResult, Capabilities, Disposable, Scheduler, SchedulerError,
};

#[test]
fn test_scheduler_config_from_json() {
    let cfg = SchedulerConfig::from_json_str(
        r#"{ "kind": "bounded", "threads": 2, "queue_capacity": 32, "thread_name_prefix": "ingest" }"#,
    )
    .unwrap();
    assert_eq!(cfg.kind, SchedulerKind::Bounded);
    assert_eq!(cfg.threads, Some(2));
    assert_eq!(cfg.queue_capacity, Some(32));
    assert!(cfg.timer);
    assert_eq!(cfg.thread_name_prefix, "ingest");
}

#[test]
fn test_scheduler_config_json_defaults() {
    let cfg = SchedulerConfig::from_json_str("{}").unwrap();
    assert_eq!(cfg, SchedulerConfig::default());
}

#[test]
fn test_scheduler_config_json_rejects_invalid() {
    assert!(SchedulerConfig::from_json_str(r#"{ "kind": "fifo" }"#)
        .unwrap_err()
        .starts_with("parse error"));
    assert!(SchedulerConfig::from_json_str(r#"{ "kind": "bounded" }"#).is_err());
    assert!(SchedulerConfig::from_json_str(r#"{ "kind": "single", "threads": 3 }"#).is_err());
    assert!(SchedulerConfig::from_json_str(r#"{ "threads": 0 }"#).is_err());
}

#[test]
fn test_executor_config_round_trips_through_serde() {
    let cfg = ExecutorConfig::new().with_threads(3).with_queue_capacity(9);
    let json = serde_json::to_string(&cfg).unwrap();
    let back: ExecutorConfig = serde_json::from_str(&json).unwrap();
    assert_eq!(back, cfg);
}

#[test]
fn test_build_scheduler_from_config() -> AppResult<()> {
    let cfg = SchedulerConfig::from_json_str(r#"{ "kind": "single", "timer": false }"#)
        .map_err(anyhow::Error::msg)?;
    let scheduler = build_scheduler(&cfg)?;
    assert_eq!(scheduler.capabilities(), Capabilities::IMMEDIATE);
    assert!(scheduler
        .schedule_delayed(Box::new(|| {}), std::time::Duration::from_millis(100))
        .is_not_timed());
    scheduler.dispose();
    assert!(scheduler.is_disposed());
    Ok(())
}

#[test]
fn test_build_scheduler_rejects_invalid_config() {
    let cfg = SchedulerConfig {
        kind: SchedulerKind::Parallel,
        queue_capacity: Some(4),
        ..SchedulerConfig::default()
    };
    assert!(matches!(build_scheduler(&cfg), Err(SchedulerError::InvalidConfig(_))));
}

#[test]
fn test_scheduler_config_from_env() {
    std::env::set_var("SCHEDULER_KIND", "single");
    std::env::set_var("SCHEDULER_TIMER", "false");
    std::env::set_var("SCHEDULER_THREAD_NAME_PREFIX", "env-lane");

    let cfg = SchedulerConfig::from_env().unwrap();
    assert_eq!(cfg.kind, SchedulerKind::Single);
    assert!(!cfg.timer);
    assert_eq!(cfg.thread_name_prefix, "env-lane");

    let executor = cfg.executor_config().unwrap();
    assert_eq!(executor.threads, 1);
    assert_eq!(executor.thread_name_prefix, "env-lane");
}
