//! Error types for the AI crate.
//!
//! `LlmError` describes what went wrong talking to a model provider.
//! `LlmFailureKind` is the coarse classification callers record when they
//! substitute a default answer, so logs can tell a timeout from a reply
//! that could not be parsed.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Errors from LLM backend operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LlmError {
    /// Provider could not be reached.
    ProviderUnavailable { provider: String, reason: String },
    /// Provider answered with a non-success status.
    RequestFailed { status: Option<u16>, reason: String },
    /// Response body was not in the expected shape.
    ResponseParseFailed { reason: String },
    /// Timeout waiting for response.
    Timeout,
    /// Rate limit exceeded.
    RateLimited { retry_after_secs: Option<u64> },
    /// Invalid configuration.
    InvalidConfig { reason: String },
}

impl LlmError {
    /// Returns the coarse failure kind for this error.
    #[must_use]
    pub fn kind(&self) -> LlmFailureKind {
        match self {
            Self::ProviderUnavailable { .. } | Self::InvalidConfig { .. } => {
                LlmFailureKind::Unavailable
            }
            Self::RequestFailed { .. } => LlmFailureKind::RequestFailed,
            Self::ResponseParseFailed { .. } => LlmFailureKind::MalformedResponse,
            Self::Timeout => LlmFailureKind::Timeout,
            Self::RateLimited { .. } => LlmFailureKind::RateLimited,
        }
    }
}

impl fmt::Display for LlmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ProviderUnavailable { provider, reason } => {
                write!(f, "LLM provider '{provider}' unavailable: {reason}")
            }
            Self::RequestFailed {
                status: Some(status),
                reason,
            } => {
                write!(f, "LLM request failed with HTTP {status}: {reason}")
            }
            Self::RequestFailed {
                status: None,
                reason,
            } => {
                write!(f, "LLM request failed: {reason}")
            }
            Self::ResponseParseFailed { reason } => {
                write!(f, "failed to parse LLM response: {reason}")
            }
            Self::Timeout => write!(f, "LLM request timed out"),
            Self::RateLimited { retry_after_secs } => {
                if let Some(secs) = retry_after_secs {
                    write!(f, "rate limited, retry after {secs}s")
                } else {
                    write!(f, "rate limited")
                }
            }
            Self::InvalidConfig { reason } => {
                write!(f, "invalid LLM configuration: {reason}")
            }
        }
    }
}

impl std::error::Error for LlmError {}

/// Why a model-produced answer was replaced by a default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmFailureKind {
    /// No backend configured, or the provider could not be reached.
    Unavailable,
    /// The call exceeded its timeout.
    Timeout,
    /// The provider rejected the request.
    RequestFailed,
    /// The provider throttled the request.
    RateLimited,
    /// The reply could not be interpreted.
    MalformedResponse,
}

impl fmt::Display for LlmFailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Unavailable => "unavailable",
            Self::Timeout => "timeout",
            Self::RequestFailed => "request_failed",
            Self::RateLimited => "rate_limited",
            Self::MalformedResponse => "malformed_response",
        };
        f.write_str(label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn llm_error_display() {
        let err = LlmError::ProviderUnavailable {
            provider: "openai_compatible".to_string(),
            reason: "connection refused".to_string(),
        };
        assert!(err.to_string().contains("openai_compatible"));
        assert!(err.to_string().contains("connection refused"));
    }

    #[test]
    fn request_failed_display_includes_status() {
        let err = LlmError::RequestFailed {
            status: Some(502),
            reason: "bad gateway".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "LLM request failed with HTTP 502: bad gateway"
        );
    }

    #[test]
    fn errors_map_to_failure_kinds() {
        assert_eq!(LlmError::Timeout.kind(), LlmFailureKind::Timeout);
        assert_eq!(
            LlmError::ResponseParseFailed {
                reason: "not json".to_string()
            }
            .kind(),
            LlmFailureKind::MalformedResponse
        );
        assert_eq!(
            LlmError::InvalidConfig {
                reason: "missing key".to_string()
            }
            .kind(),
            LlmFailureKind::Unavailable
        );
        assert_eq!(
            LlmError::RateLimited {
                retry_after_secs: Some(3)
            }
            .kind(),
            LlmFailureKind::RateLimited
        );
    }

    #[test]
    fn failure_kind_serializes_snake_case() {
        let json = serde_json::to_string(&LlmFailureKind::MalformedResponse).expect("serialize");
        assert_eq!(json, "\"malformed_response\"");
    }
}
