//! Conversation service for feedback-relay.
//!
//! This crate provides:
//!
//! - **Sessions**: per-session message history behind the [`SessionStore`]
//!   seam, with a bounded in-memory implementation
//! - **Responders**: model-backed replies with a keyword fallback
//! - **Manager**: the start/message/clear/end/history lifecycle

pub mod error;
pub mod manager;
pub mod message;
pub mod responder;
pub mod session;
pub mod welcome;

pub use error::SessionError;
pub use manager::{ConversationManager, RESPONDER_WINDOW};
pub use message::{ChatContext, Message, MessageRole};
pub use responder::{FallbackResponder, ModelResponder, Reply, ReplySource, Responder};
pub use session::{InMemorySessionStore, Session, SessionState, SessionStore, SessionStoreConfig};
pub use welcome::PageType;
