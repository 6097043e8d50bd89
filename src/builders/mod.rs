//! Builders that turn configuration into running schedulers.

pub mod scheduler_builder;

pub use scheduler_builder::build_scheduler;
