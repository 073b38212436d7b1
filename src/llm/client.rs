//! OpenAI-compatible chat-completions client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use crate::error::LlmError;

use super::{GenerationRequest, Generator};

/// Client for OpenAI-compatible `/chat/completions` endpoints.
///
/// The per-call deadline is enforced here with `tokio::time::timeout` so a
/// stalled request surfaces as `LlmError::Timeout` and funnels into the
/// caller's retry path; rate limiting (HTTP 429) surfaces as
/// `LlmError::RateLimited`; everything else is a transport-class failure.
pub struct ChatClient {
    /// Base URL for the API (e.g. "https://api.openai.com/v1").
    api_base: String,
    /// Bearer token, when the endpoint requires one.
    api_key: Option<String>,
    /// Per-call deadline.
    request_timeout: Duration,
    /// HTTP client for making API requests.
    http_client: Client,
}

impl ChatClient {
    /// Creates a new client with explicit configuration.
    pub fn new(api_base: String, api_key: Option<String>, request_timeout: Duration) -> Self {
        Self {
            api_base,
            api_key,
            request_timeout,
            http_client: Client::builder()
                .timeout(request_timeout + Duration::from_secs(5))
                .build()
                .expect("Failed to build HTTP client"),
        }
    }

    /// Returns the API base URL.
    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    /// Returns whether an API key is configured.
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    async fn post_completion(&self, request: &GenerationRequest) -> Result<String, LlmError> {
        let api_request = ApiRequest {
            model: &request.model,
            messages: vec![
                ApiMessage {
                    role: "system",
                    content: &request.system_prompt,
                },
                ApiMessage {
                    role: "user",
                    content: &request.user_prompt,
                },
            ],
            temperature: request.temperature,
            response_format: request
                .force_json
                .then_some(ResponseFormat { kind: "json_object" }),
        };

        let url = format!("{}/chat/completions", self.api_base);

        let mut http_request = self
            .http_client
            .post(&url)
            .header("Content-Type", "application/json");

        if let Some(ref api_key) = self.api_key {
            http_request = http_request.header("Authorization", format!("Bearer {}", api_key));
        }

        let http_response = http_request
            .json(&api_request)
            .send()
            .await
            .map_err(|e| LlmError::RequestFailed(e.to_string()))?;

        let status = http_response.status();

        if !status.is_success() {
            let body = http_response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error response".to_string());

            let message = serde_json::from_str::<ApiErrorResponse>(&body)
                .map(|parsed| parsed.error.message)
                .unwrap_or(body);

            if status == StatusCode::TOO_MANY_REQUESTS {
                return Err(LlmError::RateLimited(message));
            }

            return Err(LlmError::ApiError {
                code: status.as_u16(),
                message,
            });
        }

        let api_response: ApiResponse = http_response
            .json()
            .await
            .map_err(|e| LlmError::ParseError(e.to_string()))?;

        api_response
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or(LlmError::EmptyResponse)
    }
}

#[async_trait]
impl Generator for ChatClient {
    async fn generate(&self, request: GenerationRequest) -> Result<String, LlmError> {
        match tokio::time::timeout(self.request_timeout, self.post_completion(&request)).await {
            Ok(result) => result,
            Err(_) => Err(LlmError::Timeout(self.request_timeout.as_secs())),
        }
    }
}

/// Internal request structure for the OpenAI-compatible API.
#[derive(Debug, Serialize)]
struct ApiRequest<'a> {
    model: &'a str,
    messages: Vec<ApiMessage<'a>>,
    temperature: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
struct ApiMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

/// Internal response structure from the OpenAI-compatible API.
#[derive(Debug, Deserialize)]
struct ApiResponse {
    choices: Vec<ApiChoice>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ApiResponseMessage {
    content: String,
}

/// Error envelope from the API.
#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_new() {
        let client = ChatClient::new(
            "http://localhost:4000/v1".to_string(),
            Some("test-key".to_string()),
            Duration::from_secs(30),
        );

        assert_eq!(client.api_base(), "http://localhost:4000/v1");
        assert!(client.has_api_key());
    }

    #[test]
    fn test_client_without_key() {
        let client =
            ChatClient::new("http://localhost:4000/v1".to_string(), None, Duration::from_secs(30));
        assert!(!client.has_api_key());
    }

    #[test]
    fn test_api_request_serialization() {
        let api_request = ApiRequest {
            model: "test-model",
            messages: vec![ApiMessage {
                role: "user",
                content: "define run",
            }],
            temperature: 0.1,
            response_format: Some(ResponseFormat { kind: "json_object" }),
        };

        let json = serde_json::to_string(&api_request).expect("serialization should succeed");
        assert!(json.contains("\"model\":\"test-model\""));
        assert!(json.contains("\"temperature\":0.1"));
        assert!(json.contains("\"type\":\"json_object\""));
    }

    #[test]
    fn test_api_request_skips_response_format_when_disabled() {
        let api_request = ApiRequest {
            model: "m",
            messages: vec![],
            temperature: 0.5,
            response_format: None,
        };

        let json = serde_json::to_string(&api_request).expect("serialization should succeed");
        assert!(!json.contains("response_format"));
    }

    #[tokio::test]
    async fn test_connection_error_is_transport_failure() {
        // Port unlikely to have a server listening.
        let client = ChatClient::new(
            "http://localhost:65535/v1".to_string(),
            None,
            Duration::from_secs(5),
        );

        let request = GenerationRequest::new("m", "s", "define run", 0.1);
        let result = client.generate(request).await;

        assert!(matches!(result, Err(LlmError::RequestFailed(_))));
    }
}
