//! OpenAI-compatible chat completions backend.

use crate::backend::{LlmBackend, LlmBackendConfig, LlmProvider, LlmRequest, LlmResponse, TokenUsage};
use crate::error::LlmError;
use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue, RETRY_AFTER};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{instrument, warn};

/// Backend speaking the `/chat/completions` protocol.
#[derive(Debug, Clone)]
pub struct OpenAiCompatibleBackend {
    client: reqwest::Client,
    config: LlmBackendConfig,
}

impl OpenAiCompatibleBackend {
    /// Creates a backend with a per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the key, base URL or model is empty, or if
    /// the HTTP client cannot be built.
    pub fn new(config: LlmBackendConfig, timeout: Duration) -> Result<Self, LlmError> {
        if config.api_key.trim().is_empty() {
            return Err(LlmError::InvalidConfig {
                reason: "API key is empty".to_string(),
            });
        }
        if config.base_url.trim().is_empty() {
            return Err(LlmError::InvalidConfig {
                reason: "base URL is empty".to_string(),
            });
        }
        if config.model.trim().is_empty() {
            return Err(LlmError::InvalidConfig {
                reason: "model name is empty".to_string(),
            });
        }

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let bearer = format!("Bearer {}", config.api_key.trim());
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&bearer).map_err(|e| LlmError::InvalidConfig {
                reason: format!("invalid API key header: {e}"),
            })?,
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| LlmError::InvalidConfig {
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self { client, config })
    }

    fn chat_completions_url(&self) -> String {
        let base = self.config.base_url.trim_end_matches('/');
        if base.ends_with("/chat/completions") {
            return base.to_string();
        }
        format!("{base}/chat/completions")
    }

    fn map_transport_error(&self, error: &reqwest::Error) -> LlmError {
        if error.is_timeout() {
            LlmError::Timeout
        } else if error.is_connect() {
            LlmError::ProviderUnavailable {
                provider: self.config.provider.as_str().to_string(),
                reason: error.to_string(),
            }
        } else {
            LlmError::RequestFailed {
                status: None,
                reason: error.to_string(),
            }
        }
    }
}

#[derive(Deserialize)]
struct ChatCompletion {
    #[serde(default)]
    model: Option<String>,
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

#[async_trait]
impl LlmBackend for OpenAiCompatibleBackend {
    #[instrument(skip(self, request), fields(model = %self.config.model))]
    async fn generate(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        let mut body = json!({
            "model": self.config.model,
            "messages": request.messages(),
        });
        if let Some(temperature) = request.temperature {
            body["temperature"] = json!(temperature);
        }

        let url = self.chat_completions_url();
        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, endpoint = %url, "LLM request failed to send");
                self.map_transport_error(&e)
            })?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.trim().parse::<u64>().ok());
            return Err(LlmError::RateLimited { retry_after_secs });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, body = %body, "LLM endpoint returned error");
            return Err(LlmError::RequestFailed {
                status: Some(status.as_u16()),
                reason: body,
            });
        }

        let completion: ChatCompletion = response.json().await.map_err(|e| {
            if e.is_timeout() {
                LlmError::Timeout
            } else {
                LlmError::ResponseParseFailed {
                    reason: e.to_string(),
                }
            }
        })?;

        let content = completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| LlmError::ResponseParseFailed {
                reason: "response has no message content".to_string(),
            })?;

        let usage = completion
            .usage
            .map(|u| TokenUsage {
                input_tokens: u.prompt_tokens,
                output_tokens: u.completion_tokens,
            })
            .unwrap_or_default();

        Ok(LlmResponse {
            content,
            usage,
            model: completion
                .model
                .unwrap_or_else(|| self.config.model.clone()),
        })
    }

    fn provider(&self) -> LlmProvider {
        self.config.provider
    }

    fn model(&self) -> &str {
        &self.config.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn backend_for(server: &MockServer, timeout: Duration) -> OpenAiCompatibleBackend {
        let config = LlmBackendConfig::openai_compatible(
            format!("{}/v1", server.base_url()),
            "test-model",
            "test-key",
        );
        OpenAiCompatibleBackend::new(config, timeout).expect("backend should build")
    }

    #[test]
    fn rejects_empty_api_key() {
        let config = LlmBackendConfig::openai_compatible("http://localhost", "m", "  ");
        let err = OpenAiCompatibleBackend::new(config, Duration::from_secs(1))
            .expect_err("empty key should fail");
        assert!(matches!(err, LlmError::InvalidConfig { .. }));
    }

    #[tokio::test]
    async fn sends_chat_completion_and_reads_reply() {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/v1/chat/completions")
                .header("authorization", "Bearer test-key")
                .json_body_includes(
                    json!({
                        "model": "test-model",
                        "messages": [
                            {"role": "system", "content": "be kind"},
                            {"role": "user", "content": "hello"}
                        ],
                        "temperature": 0.0
                    })
                    .to_string(),
                );
            then.status(200).json_body(json!({
                "model": "test-model-0613",
                "choices": [{"message": {"role": "assistant", "content": "hi there"}}],
                "usage": {"prompt_tokens": 7, "completion_tokens": 2}
            }));
        });

        let backend = backend_for(&server, Duration::from_secs(5));
        let request = LlmRequest::new("hello")
            .with_system("be kind")
            .with_temperature(0.0);
        let response = backend.generate(&request).await.expect("should succeed");

        mock.assert();
        assert_eq!(response.content, "hi there");
        assert_eq!(response.model, "test-model-0613");
        assert_eq!(response.usage.total(), 9);
    }

    #[tokio::test]
    async fn maps_server_error_to_request_failed() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(POST).path("/v1/chat/completions");
            then.status(500).body("upstream exploded");
        });

        let backend = backend_for(&server, Duration::from_secs(5));
        let err = backend
            .generate(&LlmRequest::new("hello"))
            .await
            .expect_err("should fail");
        assert_eq!(
            err,
            LlmError::RequestFailed {
                status: Some(500),
                reason: "upstream exploded".to_string()
            }
        );
    }

    #[tokio::test]
    async fn maps_429_to_rate_limited() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(POST).path("/v1/chat/completions");
            then.status(429).header("retry-after", "12");
        });

        let backend = backend_for(&server, Duration::from_secs(5));
        let err = backend
            .generate(&LlmRequest::new("hello"))
            .await
            .expect_err("should fail");
        assert_eq!(
            err,
            LlmError::RateLimited {
                retry_after_secs: Some(12)
            }
        );
    }

    #[tokio::test]
    async fn slow_provider_times_out() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(POST).path("/v1/chat/completions");
            then.status(200)
                .delay(Duration::from_millis(500))
                .json_body(json!({"choices": [{"message": {"content": "late"}}]}));
        });

        let backend = backend_for(&server, Duration::from_millis(50));
        let err = backend
            .generate(&LlmRequest::new("hello"))
            .await
            .expect_err("should time out");
        assert_eq!(err, LlmError::Timeout);
    }

    #[tokio::test]
    async fn missing_choices_is_a_parse_failure() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(POST).path("/v1/chat/completions");
            then.status(200).json_body(json!({"choices": []}));
        });

        let backend = backend_for(&server, Duration::from_secs(5));
        let err = backend
            .generate(&LlmRequest::new("hello"))
            .await
            .expect_err("should fail");
        assert_eq!(err.kind(), crate::error::LlmFailureKind::MalformedResponse);
    }
}
