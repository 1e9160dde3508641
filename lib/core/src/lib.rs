//! Core types and utilities for feedback-relay.
//!
//! This crate provides the identifiers and the error-handling foundation
//! shared by the triage pipeline, the conversation service and the server.

pub mod error;
pub mod id;

pub use error::Result;
pub use id::{MessageId, SessionId, TriageRunId};
