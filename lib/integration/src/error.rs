//! Error types for the integration crate.
//!
//! Errors are wrapped in rootcause reports by the clients:
//! - `TrackerError`: issue tracker reads and writes
//! - `NotifyError`: alert delivery

use std::fmt;

/// Errors from issue tracker operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackerError {
    /// Client configuration is unusable.
    InvalidConfig { reason: String },
    /// The request never produced a response.
    RequestFailed { endpoint: String, reason: String },
    /// The request timed out.
    Timeout { endpoint: String },
    /// The tracker answered with a non-success status.
    UnexpectedStatus {
        endpoint: String,
        status: u16,
        body: String,
    },
    /// The response body could not be decoded.
    ResponseParseFailed { endpoint: String, reason: String },
}

impl fmt::Display for TrackerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidConfig { reason } => {
                write!(f, "invalid tracker configuration: {reason}")
            }
            Self::RequestFailed { endpoint, reason } => {
                write!(f, "request to '{endpoint}' failed: {reason}")
            }
            Self::Timeout { endpoint } => write!(f, "request to '{endpoint}' timed out"),
            Self::UnexpectedStatus {
                endpoint,
                status,
                body,
            } => {
                write!(f, "'{endpoint}' returned HTTP {status}: {body}")
            }
            Self::ResponseParseFailed { endpoint, reason } => {
                write!(f, "failed to parse response from '{endpoint}': {reason}")
            }
        }
    }
}

impl std::error::Error for TrackerError {}

/// Errors from alert delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifyError {
    /// Channel configuration is unusable.
    InvalidConfig { reason: String },
    /// Delivery failed.
    DeliveryFailed { channel: String, reason: String },
}

impl fmt::Display for NotifyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidConfig { reason } => {
                write!(f, "invalid notifier configuration: {reason}")
            }
            Self::DeliveryFailed { channel, reason } => {
                write!(f, "alert delivery via {channel} failed: {reason}")
            }
        }
    }
}

impl std::error::Error for NotifyError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unexpected_status_display() {
        let err = TrackerError::UnexpectedStatus {
            endpoint: "https://sentry.io/api/0/issues/1/".to_string(),
            status: 403,
            body: "forbidden".to_string(),
        };
        assert!(err.to_string().contains("403"));
        assert!(err.to_string().contains("forbidden"));
    }

    #[test]
    fn delivery_failed_display() {
        let err = NotifyError::DeliveryFailed {
            channel: "slack".to_string(),
            reason: "HTTP 404".to_string(),
        };
        assert_eq!(err.to_string(), "alert delivery via slack failed: HTTP 404");
    }
}
