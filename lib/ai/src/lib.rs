//! Language-model primitives for feedback-relay.
//!
//! - **Backend**: provider-neutral request/response types and the
//!   [`LlmBackend`] trait, with an OpenAI-compatible implementation
//! - **LLM Call**: single-shot inference with optional JSON-object output
//!
//! Event tagging and chat replies are both built on [`LlmCall`].

pub mod backend;
pub mod error;
pub mod llm_call;
pub mod openai;

pub use backend::{
    LlmBackend, LlmBackendConfig, LlmMessage, LlmProvider, LlmRequest, LlmResponse, MessageRole,
    TokenUsage,
};
pub use error::{LlmError, LlmFailureKind};
pub use llm_call::{LlmCall, LlmCallResult, LlmInvocationId, extract_json_object};
pub use openai::OpenAiCompatibleBackend;
