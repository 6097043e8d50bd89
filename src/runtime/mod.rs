//! Runtime adapters that expose an async runtime as an execution facility.

#[cfg(feature = "tokio-runtime")]
pub mod tokio_executor;

#[cfg(feature = "tokio-runtime")]
pub use tokio_executor::TokioExecutor;
