//! Pipeline assembly: run configuration and the orchestrator that wires the
//! source, worker pool, and writer together.

mod config;
mod orchestrator;

pub use config::{ConfigError, PipelineConfig};
pub use orchestrator::{Pipeline, PipelineError, RunSummary};
