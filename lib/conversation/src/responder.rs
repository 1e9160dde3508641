//! Reply generation for chat turns.
//!
//! [`ModelResponder`] asks a language model and falls back to the keyword
//! table in [`FallbackResponder`] on any failure. The choice between the
//! two is made once, at startup.

use crate::message::Message;
use async_trait::async_trait;
use feedback_relay_ai::{LlmBackend, LlmCall, LlmFailureKind};
use serde::Serialize;
use std::sync::Arc;
use tracing::warn;

/// Where a reply came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "reason")]
pub enum ReplySource {
    Model,
    Fallback(LlmFailureKind),
}

/// A reply to a user message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reply {
    pub content: String,
    pub source: ReplySource,
}

/// Produces the assistant reply for a chat turn.
#[async_trait]
pub trait Responder: Send + Sync {
    /// Replies to the last message of `window`; earlier entries are the
    /// preceding turns, oldest first.
    async fn respond(&self, window: &[Message]) -> Reply;

    /// Returns true if replies can come from a language model.
    fn is_model_backed(&self) -> bool;
}

/// Deterministic keyword replies.
#[derive(Debug, Clone, Copy, Default)]
pub struct FallbackResponder;

/// Keyword groups checked in order; the first group with a hit wins.
const KEYWORD_REPLIES: [(&[&str], &str); 5] = [
    (
        &["help", "support"],
        "I'm here to help! I can assist you with technical issues, product questions, or general support. What would you like to know?",
    ),
    (
        &["payment", "billing"],
        "I understand you're having payment issues. Let me help you troubleshoot. Can you tell me more about what's happening?",
    ),
    (
        &["error", "problem"],
        "I see you're experiencing an issue. I've detected some technical problems on this page. Let me help you resolve them.",
    ),
    (
        &["feature", "request"],
        "Thank you for your feature request! I'll make sure this gets to our development team. Can you provide more details?",
    ),
    (
        &["bug", "issue"],
        "I'm sorry to hear you're experiencing a bug. Let me help you report this issue. Can you describe what happened?",
    ),
];

const DEFAULT_REPLY: &str = "Thank you for your message. I'm here to help improve your experience. Is there anything specific you'd like to discuss?";

impl FallbackResponder {
    /// Picks the scripted reply for `text`.
    #[must_use]
    pub fn reply_for(text: &str) -> &'static str {
        let lowered = text.to_lowercase();
        KEYWORD_REPLIES
            .iter()
            .find(|(keywords, _)| keywords.iter().any(|keyword| lowered.contains(keyword)))
            .map_or(DEFAULT_REPLY, |(_, reply)| *reply)
    }

    fn reply(window: &[Message], reason: LlmFailureKind) -> Reply {
        let text = window.last().map_or("", |message| message.content.as_str());
        Reply {
            content: Self::reply_for(text).to_string(),
            source: ReplySource::Fallback(reason),
        }
    }
}

#[async_trait]
impl Responder for FallbackResponder {
    async fn respond(&self, window: &[Message]) -> Reply {
        Self::reply(window, LlmFailureKind::Unavailable)
    }

    fn is_model_backed(&self) -> bool {
        false
    }
}

const SYSTEM_PROMPT: &str = "You are a helpful AI assistant integrated into a feedback widget. \
Your role is to help users with technical issues and troubleshooting, product questions and \
guidance, feedback and suggestions, and general support. Be helpful, concise, and professional. \
If the user mentions technical issues, acknowledge them and offer assistance. If they have \
feedback, encourage them to provide details.";

/// Replies with a language model, falling back to keywords on failure.
#[derive(Clone)]
pub struct ModelResponder {
    backend: Arc<dyn LlmBackend>,
}

impl std::fmt::Debug for ModelResponder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelResponder")
            .field("model", &self.backend.model())
            .finish()
    }
}

impl ModelResponder {
    /// Creates a responder over the given backend.
    #[must_use]
    pub fn new(backend: Arc<dyn LlmBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl Responder for ModelResponder {
    async fn respond(&self, window: &[Message]) -> Reply {
        let Some((latest, earlier)) = window.split_last() else {
            return FallbackResponder::reply(window, LlmFailureKind::MalformedResponse);
        };

        let call = LlmCall::new(latest.content.clone())
            .with_system_prompt(SYSTEM_PROMPT)
            .with_history(earlier.iter().map(Message::to_llm_message).collect());

        match call.execute(self.backend.as_ref()).await {
            Ok(result) if !result.content.trim().is_empty() => Reply {
                content: result.content,
                source: ReplySource::Model,
            },
            Ok(_) => {
                warn!(model = self.backend.model(), "Model returned an empty reply, using fallback");
                FallbackResponder::reply(window, LlmFailureKind::MalformedResponse)
            }
            Err(e) => {
                warn!(error = %e, kind = %e.kind(), "Model reply failed, using fallback");
                FallbackResponder::reply(window, e.kind())
            }
        }
    }

    fn is_model_backed(&self) -> bool {
        true
    }
}
