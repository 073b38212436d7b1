//! Error types for lexforge operations.
//!
//! Defines error types for the major subsystems:
//! - Generator API interactions
//! - Response validation and repair
//! - Word-list loading
//!
//! Storage, configuration and pipeline errors live next to their owners in
//! `storage::database`, `pipeline::config` and `pipeline::orchestrator`.

use thiserror::Error;

/// Errors that can occur during generator calls.
///
/// Failure classification is derived from typed signals (HTTP status codes,
/// elapsed deadlines), never from substring matching on error messages.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    #[error("HTTP request failed: {0}")]
    RequestFailed(String),

    #[error("API error ({code}): {message}")]
    ApiError { code: u16, message: String },

    #[error("Empty response: no content in any choice")]
    EmptyResponse,

    #[error("Failed to parse API response: {0}")]
    ParseError(String),
}

impl LlmError {
    /// Returns whether this failure should back off exponentially before the
    /// next attempt (as opposed to the short fixed delay used for payload
    /// parse failures).
    pub fn is_throttle(&self) -> bool {
        matches!(self, LlmError::RateLimited(_))
    }
}

/// Errors that can occur while validating and repairing generator output.
#[derive(Debug, Error)]
pub enum ValidateError {
    /// No balanced `{...}` span could be located in the raw text.
    #[error("No balanced JSON object found in response")]
    NoObjectFound,

    /// The extracted span still failed to parse after repair.
    #[error("Response unparseable after repair: {0}")]
    Unparseable(#[source] serde_json::Error),
}

/// Errors that can occur while loading the word list.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Failed to read word list '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Word list '{0}' contains no usable entries")]
    Empty(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_llm_error_display() {
        let err = LlmError::RateLimited("slow down".to_string());
        assert!(err.to_string().contains("slow down"));

        let err = LlmError::Timeout(200);
        assert!(err.to_string().contains("200"));

        let err = LlmError::ApiError {
            code: 503,
            message: "overloaded".to_string(),
        };
        assert!(err.to_string().contains("503"));
        assert!(err.to_string().contains("overloaded"));
    }

    #[test]
    fn test_llm_error_throttle_classification() {
        assert!(LlmError::RateLimited(String::new()).is_throttle());
        assert!(!LlmError::Timeout(10).is_throttle());
        assert!(!LlmError::RequestFailed("refused".to_string()).is_throttle());
    }

    #[test]
    fn test_source_error_display() {
        let err = SourceError::Empty("words.txt".to_string());
        assert!(err.to_string().contains("words.txt"));
    }
}
