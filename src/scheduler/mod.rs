//! Concurrency scheduling: the worker pool and its retry backoff policy.

mod backoff;
mod worker;

pub use backoff::BackoffPolicy;
pub use worker::{PoolStats, WorkerConfig, WorkerPool};
