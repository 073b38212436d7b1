//! Pipeline configuration.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::scheduler::BackoffPolicy;

/// Errors from configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Invalid configuration: {0}")]
    Validation(String),
}

/// Immutable configuration for one pipeline run.
///
/// Built once at startup (defaults, then environment, then CLI overrides)
/// and shared read-only from there; nothing reads tunables from globals
/// mid-run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Path to the SQLite database file.
    pub database_path: PathBuf,
    /// Number of concurrent generation workers.
    pub concurrency: usize,
    /// Attempts per word before recording a permanent failure.
    pub max_attempts: u32,
    /// Per-call generator deadline.
    pub request_timeout: Duration,
    /// Buffered results that trigger a flush.
    pub batch_size: usize,
    /// Elapsed time with pending data that triggers a flush.
    pub flush_interval: Duration,
    /// Capacity of the worker-to-writer channel.
    pub channel_capacity: usize,
    /// Model identifier passed to the generator.
    pub model: String,
    /// Sampling temperature.
    pub temperature: f64,
    /// Retry delay policy shared by all workers.
    pub backoff: BackoffPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("dictionary.db"),
            concurrency: 64,
            max_attempts: 3,
            request_timeout: Duration::from_secs(200),
            batch_size: 50,
            flush_interval: Duration::from_secs(2),
            channel_capacity: 256,
            model: "gpt-4o-mini".to_string(),
            temperature: 0.1,
            backoff: BackoffPolicy::default(),
        }
    }
}

impl PipelineConfig {
    /// Creates a configuration from environment variables, falling back to
    /// defaults for anything unset.
    ///
    /// Recognized variables:
    /// - `LEXFORGE_DATABASE`: database file path
    /// - `LEXFORGE_CONCURRENCY`: worker count
    /// - `LEXFORGE_MAX_ATTEMPTS`: attempts per word
    /// - `LEXFORGE_REQUEST_TIMEOUT_SECS`: per-call deadline
    /// - `LEXFORGE_BATCH_SIZE`: writer batch size
    /// - `LEXFORGE_FLUSH_INTERVAL_SECS`: writer flush interval
    /// - `LEXFORGE_MODEL`: model identifier
    /// - `LEXFORGE_TEMPERATURE`: sampling temperature
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` when a variable is set but does
    /// not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(value) = std::env::var("LEXFORGE_DATABASE") {
            config.database_path = PathBuf::from(value);
        }
        if let Some(value) = parse_env_value("LEXFORGE_CONCURRENCY")? {
            config.concurrency = value;
        }
        if let Some(value) = parse_env_value("LEXFORGE_MAX_ATTEMPTS")? {
            config.max_attempts = value;
        }
        if let Some(value) = parse_env_value("LEXFORGE_REQUEST_TIMEOUT_SECS")? {
            config.request_timeout = Duration::from_secs(value);
        }
        if let Some(value) = parse_env_value("LEXFORGE_BATCH_SIZE")? {
            config.batch_size = value;
        }
        if let Some(value) = parse_env_value("LEXFORGE_FLUSH_INTERVAL_SECS")? {
            config.flush_interval = Duration::from_secs(value);
        }
        if let Ok(value) = std::env::var("LEXFORGE_MODEL") {
            config.model = value;
        }
        if let Some(value) = parse_env_value("LEXFORGE_TEMPERATURE")? {
            config.temperature = value;
        }

        Ok(config)
    }

    /// Sets the database file path.
    pub fn with_database_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.database_path = path.into();
        self
    }

    /// Sets the worker count.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Sets the attempts per word.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Sets the model identifier.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` describing the first violated
    /// constraint.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.concurrency == 0 {
            return Err(ConfigError::Validation(
                "concurrency must be at least 1".to_string(),
            ));
        }
        if self.max_attempts == 0 {
            return Err(ConfigError::Validation(
                "max_attempts must be at least 1".to_string(),
            ));
        }
        if self.batch_size == 0 {
            return Err(ConfigError::Validation(
                "batch_size must be at least 1".to_string(),
            ));
        }
        if self.channel_capacity == 0 {
            return Err(ConfigError::Validation(
                "channel_capacity must be at least 1".to_string(),
            ));
        }
        if self.request_timeout.is_zero() {
            return Err(ConfigError::Validation(
                "request_timeout must be positive".to_string(),
            ));
        }
        if self.flush_interval.is_zero() {
            return Err(ConfigError::Validation(
                "flush_interval must be positive".to_string(),
            ));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::Validation(
                "temperature must be between 0.0 and 2.0".to_string(),
            ));
        }
        if self.model.is_empty() {
            return Err(ConfigError::Validation("model must not be empty".to_string()));
        }
        Ok(())
    }
}

fn parse_env_value<T: std::str::FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    match std::env::var(key) {
        Ok(value) => value
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                key: key.to_string(),
                value,
            }),
        Err(_) => Ok(None),
    }
}
