//! LLM Call primitive.
//!
//! Single-shot inference against an [`LlmBackend`], optionally expecting a
//! JSON object back. Both the event tagger and the chat responder are built
//! on this.

use crate::backend::{LlmBackend, LlmMessage, LlmRequest, TokenUsage};
use crate::error::LlmError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::time::Instant;
use tracing::debug;
use ulid::Ulid;

/// Unique identifier for an LLM invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LlmInvocationId(Ulid);

impl LlmInvocationId {
    /// Creates a new invocation ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for LlmInvocationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for LlmInvocationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "llm_{}", self.0)
    }
}

/// The result of an LLM Call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmCallResult {
    /// Unique identifier for this invocation.
    pub id: LlmInvocationId,
    /// The raw text output.
    pub content: String,
    /// Token usage statistics.
    pub usage: TokenUsage,
    /// Model that generated the response.
    pub model: String,
    /// When the call completed.
    pub timestamp: DateTime<Utc>,
    /// Latency in milliseconds.
    pub latency_ms: u64,
}

/// An LLM Call builder and executor.
#[derive(Debug, Clone)]
pub struct LlmCall {
    prompt: String,
    system_prompt: Option<String>,
    history: Vec<LlmMessage>,
    temperature: Option<f32>,
}

impl LlmCall {
    /// Creates a new LLM Call with the given prompt.
    #[must_use]
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            system_prompt: None,
            history: Vec::new(),
            temperature: None,
        }
    }

    /// Adds a system prompt.
    #[must_use]
    pub fn with_system_prompt(mut self, system: impl Into<String>) -> Self {
        self.system_prompt = Some(system.into());
        self
    }

    /// Adds earlier conversation turns, oldest first.
    #[must_use]
    pub fn with_history(mut self, history: Vec<LlmMessage>) -> Self {
        self.history = history;
        self
    }

    /// Sets the temperature.
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Builds an LLM request from this configuration.
    #[must_use]
    pub fn build_request(&self) -> LlmRequest {
        let mut request = LlmRequest::new(self.prompt.clone()).with_context(self.history.clone());

        if let Some(ref system) = self.system_prompt {
            request = request.with_system(system.clone());
        }

        if let Some(temp) = self.temperature {
            request = request.with_temperature(temp);
        }

        request
    }

    /// Sends the call and returns the raw text reply.
    ///
    /// # Errors
    ///
    /// Returns the backend's error unchanged.
    pub async fn execute(&self, backend: &dyn LlmBackend) -> Result<LlmCallResult, LlmError> {
        let request = self.build_request();
        let started = Instant::now();
        let response = backend.generate(&request).await?;
        let latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        let result = LlmCallResult {
            id: LlmInvocationId::new(),
            content: response.content,
            usage: response.usage,
            model: response.model,
            timestamp: Utc::now(),
            latency_ms,
        };

        debug!(
            invocation_id = %result.id,
            model = %result.model,
            latency_ms = result.latency_ms,
            tokens = result.usage.total(),
            "LLM call completed"
        );

        Ok(result)
    }

    /// Sends the call and parses the reply as a JSON object.
    ///
    /// # Errors
    ///
    /// Returns the backend's error, or `ResponseParseFailed` when the reply
    /// holds no JSON object.
    pub async fn execute_json(
        &self,
        backend: &dyn LlmBackend,
    ) -> Result<Map<String, JsonValue>, LlmError> {
        let result = self.execute(backend).await?;
        extract_json_object(&result.content).ok_or_else(|| LlmError::ResponseParseFailed {
            reason: format!("no JSON object in reply: {}", truncate(&result.content, 200)),
        })
    }
}

/// Finds the first JSON object in a model reply.
///
/// Models often wrap JSON in prose or Markdown fences, so this scans for the
/// first `{` that starts a complete, parseable object.
#[must_use]
pub fn extract_json_object(content: &str) -> Option<Map<String, JsonValue>> {
    let trimmed = content.trim();
    if let Ok(JsonValue::Object(map)) = serde_json::from_str(trimmed) {
        return Some(map);
    }

    for (start, _) in trimmed.match_indices('{') {
        let mut stream =
            serde_json::Deserializer::from_str(&trimmed[start..]).into_iter::<JsonValue>();
        if let Some(Ok(JsonValue::Object(map))) = stream.next() {
            return Some(map);
        }
    }

    None
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max_chars).collect();
    out.push_str("...");
    out
}
