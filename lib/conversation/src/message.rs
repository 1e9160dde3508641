//! Message types for conversations.

use chrono::{DateTime, Utc};
use feedback_relay_ai::LlmMessage;
use feedback_relay_core::MessageId;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

/// Free-form page context sent by the widget (e.g. `{"pageType": "payment"}`).
pub type ChatContext = Map<String, JsonValue>;

/// The role of a message sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// Widget user.
    User,
    /// Assistant reply or welcome.
    Assistant,
}

/// A message in a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub role: MessageRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    /// Page context the user message was sent with.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<ChatContext>,
}

impl Message {
    /// Creates a new message stamped with the current time.
    #[must_use]
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            id: MessageId::new(),
            role,
            content: content.into(),
            timestamp: Utc::now(),
            context: None,
        }
    }

    /// Creates a user message.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }

    /// Creates an assistant message.
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content)
    }

    /// Attaches page context.
    #[must_use]
    pub fn with_context(mut self, context: Option<ChatContext>) -> Self {
        self.context = context;
        self
    }

    /// Converts to a model message.
    #[must_use]
    pub fn to_llm_message(&self) -> LlmMessage {
        match self.role {
            MessageRole::User => LlmMessage::user(self.content.clone()),
            MessageRole::Assistant => LlmMessage::assistant(self.content.clone()),
        }
    }
}
