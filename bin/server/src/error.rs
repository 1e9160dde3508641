//! Server error types.
//!
//! `ApiError` is what handlers return; it renders as HTTP 500 with a
//! `{"detail": ...}` body. `StartupError` covers wiring failures before
//! the listener is bound.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use feedback_relay_conversation::SessionError;
use rootcause::prelude::Report;
use serde_json::json;
use std::fmt;

/// Errors surfaced by request handlers.
#[derive(Debug)]
pub enum ApiError {
    /// The conversation store failed.
    Conversation { detail: String },
}

impl From<Report<SessionError>> for ApiError {
    fn from(report: Report<SessionError>) -> Self {
        Self::Conversation {
            detail: report.to_string(),
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Conversation { detail } => write!(f, "{detail}"),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let detail = self.to_string();
        tracing::error!(error = %detail, "Request failed");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "detail": detail })),
        )
            .into_response()
    }
}

/// Errors while assembling the application from configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartupError {
    /// A configured value cannot be used.
    InvalidConfig { reason: String },
    /// The issue tracker client could not be built.
    Tracker { reason: String },
    /// The alert channel could not be built.
    Notifier { reason: String },
}

impl fmt::Display for StartupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidConfig { reason } => write!(f, "invalid configuration: {reason}"),
            Self::Tracker { reason } => write!(f, "failed to set up issue tracker: {reason}"),
            Self::Notifier { reason } => write!(f, "failed to set up alert channel: {reason}"),
        }
    }
}

impl std::error::Error for StartupError {}
