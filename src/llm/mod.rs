//! External generator client.
//!
//! This module defines the `Generator` trait the worker pool calls, plus an
//! OpenAI-compatible chat-completions client implementing it. Failures are
//! surfaced as typed `LlmError` variants derived from status codes and
//! deadlines so that retry policy never has to inspect error strings.

mod client;

pub use client::ChatClient;

use async_trait::async_trait;

use crate::error::LlmError;

/// Request for one entry generation.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    /// Model identifier to use for generation.
    pub model: String,
    /// System message constraining output shape.
    pub system_prompt: String,
    /// Rendered user prompt for one headword.
    pub user_prompt: String,
    /// Sampling temperature.
    pub temperature: f64,
    /// Ask the endpoint for structured JSON output when it supports it.
    pub force_json: bool,
}

impl GenerationRequest {
    /// Creates a new request with JSON output enforcement enabled.
    pub fn new(
        model: impl Into<String>,
        system_prompt: impl Into<String>,
        user_prompt: impl Into<String>,
        temperature: f64,
    ) -> Self {
        Self {
            model: model.into(),
            system_prompt: system_prompt.into(),
            user_prompt: user_prompt.into(),
            temperature,
            force_json: true,
        }
    }

    /// Disables structured-output enforcement for endpoints that reject it.
    pub fn without_forced_json(mut self) -> Self {
        self.force_json = false;
        self
    }
}

/// Trait for services that can generate entry text.
///
/// One call per work item attempt; implementations must be safe to share
/// across worker tasks.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Generates raw text for the given request.
    async fn generate(&self, request: GenerationRequest) -> Result<String, LlmError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_defaults_to_forced_json() {
        let request = GenerationRequest::new("test-model", "system", "user", 0.1);
        assert!(request.force_json);
        assert_eq!(request.model, "test-model");
        assert!((request.temperature - 0.1).abs() < f64::EPSILON);
    }

    #[test]
    fn test_without_forced_json() {
        let request = GenerationRequest::new("m", "s", "u", 0.5).without_forced_json();
        assert!(!request.force_json);
    }
}
