//! Issue tracker client.
//!
//! [`IssueTracker`] is the seam the triage pipeline talks to;
//! [`SentryClient`] implements it against the Sentry REST API.

use crate::error::TrackerError;
use crate::event::Event;
use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use rootcause::prelude::Report;
use serde::Deserialize;
use serde_json::{Value as JsonValue, json};
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Sentry API settings.
#[derive(Debug, Clone, Deserialize)]
pub struct SentryConfig {
    /// Bearer token for the Sentry API.
    pub api_token: String,
    /// Organization slug.
    pub org_slug: String,
    /// Project slug.
    pub project_slug: String,
    /// API base URL.
    /// Default: "https://sentry.io/api/0"
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

fn default_base_url() -> String {
    "https://sentry.io/api/0".to_string()
}

impl SentryConfig {
    /// Creates a configuration against the hosted Sentry API.
    #[must_use]
    pub fn new(
        api_token: impl Into<String>,
        org_slug: impl Into<String>,
        project_slug: impl Into<String>,
    ) -> Self {
        Self {
            api_token: api_token.into(),
            org_slug: org_slug.into(),
            project_slug: project_slug.into(),
            base_url: default_base_url(),
        }
    }

    /// Overrides the API base URL.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// URL listing the project's events.
    #[must_use]
    pub fn events_url(&self) -> String {
        format!(
            "{}/projects/{}/{}/events/",
            self.base_url.trim_end_matches('/'),
            self.org_slug,
            self.project_slug
        )
    }

    /// URL of a single issue.
    #[must_use]
    pub fn issue_url(&self, issue_id: &str) -> String {
        format!("{}/issues/{}/", self.base_url.trim_end_matches('/'), issue_id)
    }
}

/// Read and write access to the issue tracker.
#[async_trait]
pub trait IssueTracker: Send + Sync {
    /// Returns every event the tracker currently lists for the project.
    async fn fetch_events(&self) -> Result<Vec<Event>, Report<TrackerError>>;

    /// Replaces an issue's tags with the given key/value pairs.
    async fn update_issue_tags(
        &self,
        issue_id: &str,
        tags: &[(String, String)],
    ) -> Result<(), Report<TrackerError>>;
}

/// Sentry REST client.
#[derive(Debug, Clone)]
pub struct SentryClient {
    client: reqwest::Client,
    config: SentryConfig,
}

impl SentryClient {
    /// Creates a client whose requests time out after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the token or slugs are empty or the HTTP
    /// client cannot be built.
    pub fn new(config: SentryConfig, timeout: Duration) -> Result<Self, Report<TrackerError>> {
        for (name, value) in [
            ("api_token", &config.api_token),
            ("org_slug", &config.org_slug),
            ("project_slug", &config.project_slug),
        ] {
            if value.trim().is_empty() {
                return Err(TrackerError::InvalidConfig {
                    reason: format!("{name} is empty"),
                }
                .into());
            }
        }

        let mut headers = HeaderMap::new();
        let bearer = format!("Bearer {}", config.api_token.trim());
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&bearer).map_err(|e| TrackerError::InvalidConfig {
                reason: format!("invalid API token header: {e}"),
            })?,
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| TrackerError::InvalidConfig {
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self { client, config })
    }
}

fn transport_error(endpoint: &str, error: &reqwest::Error) -> TrackerError {
    if error.is_timeout() {
        TrackerError::Timeout {
            endpoint: endpoint.to_string(),
        }
    } else {
        TrackerError::RequestFailed {
            endpoint: endpoint.to_string(),
            reason: error.to_string(),
        }
    }
}

#[async_trait]
impl IssueTracker for SentryClient {
    #[instrument(skip(self), fields(project = %self.config.project_slug))]
    async fn fetch_events(&self) -> Result<Vec<Event>, Report<TrackerError>> {
        let url = self.config.events_url();

        let response = self.client.get(&url).send().await.map_err(|e| {
            warn!(error = %e, endpoint = %url, "Failed to fetch tracker events");
            transport_error(&url, &e)
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(endpoint = %url, status = %status, body = %body, "Event listing returned error");
            return Err(TrackerError::UnexpectedStatus {
                endpoint: url,
                status: status.as_u16(),
                body,
            }
            .into());
        }

        let listed: Vec<JsonValue> =
            response
                .json()
                .await
                .map_err(|e| TrackerError::ResponseParseFailed {
                    endpoint: url.clone(),
                    reason: e.to_string(),
                })?;

        let total = listed.len();
        let events: Vec<Event> = listed
            .into_iter()
            .filter_map(|value| match value {
                JsonValue::Object(fields) => Some(Event::new(fields)),
                _ => None,
            })
            .collect();
        if events.len() < total {
            debug!(skipped = total - events.len(), "Skipped non-object event entries");
        }

        debug!(count = events.len(), "Fetched tracker events");
        Ok(events)
    }

    #[instrument(skip(self, tags))]
    async fn update_issue_tags(
        &self,
        issue_id: &str,
        tags: &[(String, String)],
    ) -> Result<(), Report<TrackerError>> {
        let url = self.config.issue_url(issue_id);
        let pairs: Vec<[&str; 2]> = tags
            .iter()
            .map(|(key, value)| [key.as_str(), value.as_str()])
            .collect();

        let response = self
            .client
            .put(&url)
            .json(&json!({ "tags": pairs }))
            .send()
            .await
            .map_err(|e| transport_error(&url, &e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TrackerError::UnexpectedStatus {
                endpoint: url,
                status: status.as_u16(),
                body,
            }
            .into());
        }

        Ok(())
    }
}
