//! LLM backend abstraction.
//!
//! Provides a unified interface over chat-completion providers so the
//! tagger and the chat responder can be tested without a network.

use crate::error::LlmError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Available LLM providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmProvider {
    /// Any endpoint speaking the OpenAI chat completions protocol.
    OpenAiCompatible,
}

impl LlmProvider {
    /// Returns the provider name used in logs and errors.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAiCompatible => "openai_compatible",
        }
    }
}

/// Configuration for an LLM backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmBackendConfig {
    /// The provider type.
    pub provider: LlmProvider,
    /// Base URL for the API, e.g. `https://api.openai.com/v1`.
    pub base_url: String,
    /// Model identifier.
    pub model: String,
    /// API key sent as a bearer token.
    pub api_key: String,
}

impl LlmBackendConfig {
    /// Creates a configuration for an OpenAI-compatible endpoint.
    #[must_use]
    pub fn openai_compatible(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            provider: LlmProvider::OpenAiCompatible,
            base_url: base_url.into(),
            model: model.into(),
            api_key: api_key.into(),
        }
    }
}

/// A request to an LLM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmRequest {
    /// The final user turn.
    pub prompt: String,
    /// System prompt, if any.
    pub system: Option<String>,
    /// Earlier turns, oldest first, sent before the prompt.
    pub context: Vec<LlmMessage>,
    /// Temperature for sampling (0.0 - 1.0).
    pub temperature: Option<f32>,
}

impl LlmRequest {
    /// Creates a new simple request with just a prompt.
    #[must_use]
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            system: None,
            context: Vec::new(),
            temperature: None,
        }
    }

    /// Adds a system prompt.
    #[must_use]
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Adds context messages.
    #[must_use]
    pub fn with_context(mut self, context: Vec<LlmMessage>) -> Self {
        self.context = context;
        self
    }

    /// Sets the temperature.
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Returns every message in send order: system, context, then the prompt.
    #[must_use]
    pub fn messages(&self) -> Vec<LlmMessage> {
        let mut messages = Vec::with_capacity(self.context.len() + 2);
        if let Some(system) = &self.system {
            messages.push(LlmMessage::system(system.clone()));
        }
        messages.extend(self.context.iter().cloned());
        messages.push(LlmMessage::user(self.prompt.clone()));
        messages
    }
}

/// A message in a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LlmMessage {
    /// The role of the message sender.
    pub role: MessageRole,
    /// The content of the message.
    pub content: String,
}

impl LlmMessage {
    /// Creates a user message.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    /// Creates an assistant message.
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }

    /// Creates a system message.
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }
}

/// The role of a message sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// User/human message.
    User,
    /// Assistant/AI message.
    Assistant,
    /// System message.
    System,
}

/// A response from an LLM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmResponse {
    /// The generated content.
    pub content: String,
    /// Token usage statistics.
    pub usage: TokenUsage,
    /// Model that generated the response.
    pub model: String,
}

/// Token usage statistics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Number of input tokens.
    pub input_tokens: u32,
    /// Number of output tokens.
    pub output_tokens: u32,
}

impl TokenUsage {
    /// Returns the total number of tokens.
    #[must_use]
    pub fn total(&self) -> u32 {
        self.input_tokens + self.output_tokens
    }
}

/// Trait for LLM backends.
#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// Generates a response for the given request.
    ///
    /// # Errors
    ///
    /// Returns an error if the LLM call fails.
    async fn generate(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError>;

    /// Returns the provider type.
    fn provider(&self) -> LlmProvider;

    /// Returns the model name.
    fn model(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn llm_request_builder() {
        let request = LlmRequest::new("Hello, world!")
            .with_system("You are a helpful assistant.")
            .with_temperature(0.7);

        assert_eq!(request.prompt, "Hello, world!");
        assert_eq!(
            request.system,
            Some("You are a helpful assistant.".to_string())
        );
        assert_eq!(request.temperature, Some(0.7));
    }

    #[test]
    fn messages_are_ordered_system_context_prompt() {
        let request = LlmRequest::new("latest")
            .with_system("be brief")
            .with_context(vec![
                LlmMessage::user("first"),
                LlmMessage::assistant("second"),
            ]);

        let messages = request.messages();
        let roles: Vec<MessageRole> = messages.iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![
                MessageRole::System,
                MessageRole::User,
                MessageRole::Assistant,
                MessageRole::User
            ]
        );
        assert_eq!(messages[3].content, "latest");
    }

    #[test]
    fn messages_without_system_start_with_context() {
        let messages = LlmRequest::new("only").messages();
        assert_eq!(messages, vec![LlmMessage::user("only")]);
    }

    #[test]
    fn token_usage_total() {
        let usage = TokenUsage {
            input_tokens: 100,
            output_tokens: 50,
        };
        assert_eq!(usage.total(), 150);
    }

    #[test]
    fn openai_compatible_config() {
        let config =
            LlmBackendConfig::openai_compatible("http://llm.local/v1", "small", "sk-test");
        assert_eq!(config.provider, LlmProvider::OpenAiCompatible);
        assert_eq!(config.provider.as_str(), "openai_compatible");
        assert_eq!(config.model, "small");
    }
}
