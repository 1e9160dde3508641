//! One-way alert delivery.
//!
//! Alerts are fire-and-forget: callers log a failed delivery and move on.

use crate::error::NotifyError;
use async_trait::async_trait;
use rootcause::prelude::Report;
use serde::Serialize;
use serde_json::json;
use std::time::Duration;
use tracing::{instrument, warn};

/// An alert about a single tracker event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Alert {
    /// Tracker event id, when known.
    pub event_id: Option<String>,
    /// Event message shown to responders.
    pub message: String,
    /// Key/value labels attached to the alert, in display order.
    pub labels: Vec<(String, String)>,
}

impl Alert {
    /// Renders the alert as a single line of text.
    #[must_use]
    pub fn render(&self) -> String {
        let labels = self
            .labels
            .iter()
            .map(|(key, value)| format!("{key}={value}"))
            .collect::<Vec<_>>()
            .join(" ");
        format!("Urgent issue detected: {} | {}", self.message, labels)
    }
}

/// A channel that can deliver alerts.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Delivers an alert.
    async fn notify(&self, alert: &Alert) -> Result<(), Report<NotifyError>>;

    /// Returns the channel name used in logs.
    fn channel(&self) -> &'static str;
}

/// Writes alerts to the log stream.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, alert: &Alert) -> Result<(), Report<NotifyError>> {
        warn!(
            target: "feedback_relay::alert",
            event_id = alert.event_id.as_deref().unwrap_or("-"),
            "{}",
            alert.render()
        );
        Ok(())
    }

    fn channel(&self) -> &'static str {
        "log"
    }
}

/// Posts alerts to a Slack incoming webhook.
#[derive(Debug, Clone)]
pub struct SlackWebhookNotifier {
    client: reqwest::Client,
    webhook_url: String,
}

impl SlackWebhookNotifier {
    /// Creates a notifier for the given webhook URL.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the URL is empty or the HTTP client cannot
    /// be built.
    pub fn new(
        webhook_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, Report<NotifyError>> {
        let webhook_url = webhook_url.into();
        if webhook_url.trim().is_empty() {
            return Err(NotifyError::InvalidConfig {
                reason: "webhook URL is empty".to_string(),
            }
            .into());
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| NotifyError::InvalidConfig {
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            client,
            webhook_url,
        })
    }
}

#[async_trait]
impl Notifier for SlackWebhookNotifier {
    #[instrument(skip(self, alert), fields(event_id = ?alert.event_id))]
    async fn notify(&self, alert: &Alert) -> Result<(), Report<NotifyError>> {
        let text = format!(":rotating_light: {}", alert.render());
        let response = self
            .client
            .post(&self.webhook_url)
            .json(&json!({ "text": text }))
            .send()
            .await
            .map_err(|e| NotifyError::DeliveryFailed {
                channel: self.channel().to_string(),
                reason: if e.is_timeout() {
                    "request timed out".to_string()
                } else {
                    e.to_string()
                },
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NotifyError::DeliveryFailed {
                channel: self.channel().to_string(),
                reason: format!("HTTP {status}: {body}"),
            }
            .into());
        }

        Ok(())
    }

    fn channel(&self) -> &'static str {
        "slack"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn alert() -> Alert {
        Alert {
            event_id: Some("e1".to_string()),
            message: "Checkout crashes".to_string(),
            labels: vec![
                ("theme".to_string(), "bug".to_string()),
                ("urgency".to_string(), "high".to_string()),
            ],
        }
    }

    #[test]
    fn render_lists_labels_in_order() {
        assert_eq!(
            alert().render(),
            "Urgent issue detected: Checkout crashes | theme=bug urgency=high"
        );
    }

    #[tokio::test]
    async fn log_notifier_always_succeeds() {
        assert!(LogNotifier.notify(&alert()).await.is_ok());
    }

    #[test]
    fn slack_notifier_requires_url() {
        assert!(SlackWebhookNotifier::new("", Duration::from_secs(1)).is_err());
    }

    #[tokio::test]
    async fn slack_notifier_posts_text_payload() {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/hooks/T000")
                .body_includes("Checkout crashes");
            then.status(200).body("ok");
        });

        let notifier =
            SlackWebhookNotifier::new(server.url("/hooks/T000"), Duration::from_secs(5))
                .expect("notifier should build");
        notifier.notify(&alert()).await.expect("delivery should succeed");

        mock.assert();
    }

    #[tokio::test]
    async fn slack_notifier_reports_rejected_delivery() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(POST).path("/hooks/T000");
            then.status(404).body("no_service");
        });

        let notifier =
            SlackWebhookNotifier::new(server.url("/hooks/T000"), Duration::from_secs(5))
                .expect("notifier should build");
        assert!(notifier.notify(&alert()).await.is_err());
    }

    #[tokio::test]
    async fn slow_webhook_times_out() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(POST).path("/hooks/T000");
            then.status(200).delay(Duration::from_millis(500)).body("ok");
        });

        let notifier =
            SlackWebhookNotifier::new(server.url("/hooks/T000"), Duration::from_millis(50))
                .expect("notifier should build");
        let message = notifier
            .notify(&alert())
            .await
            .expect_err("should time out")
            .to_string();
        assert!(message.contains("alert delivery via slack failed"));
        assert!(message.contains("timed out"));
    }
}
