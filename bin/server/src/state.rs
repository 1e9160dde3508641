//! Shared application state and its construction from configuration.

use crate::config::ServerConfig;
use crate::error::StartupError;
use feedback_relay_ai::{LlmBackend, LlmBackendConfig, OpenAiCompatibleBackend};
use feedback_relay_conversation::{
    ConversationManager, FallbackResponder, InMemorySessionStore, ModelResponder, Responder,
    SessionStore,
};
use feedback_relay_integration::{
    IssueTracker, LogNotifier, Notifier, SentryClient, SlackWebhookNotifier,
};
use feedback_relay_triage::{Tagger, TriagePipeline};
use rootcause::prelude::Report;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Conversation lifecycle over the session store.
    pub conversations: ConversationManager,
    /// Triage run, shared by the HTTP trigger and the schedule.
    pub pipeline: TriagePipeline,
}

impl AppState {
    /// Creates application state from its parts.
    #[must_use]
    pub fn new(conversations: ConversationManager, pipeline: TriagePipeline) -> Self {
        Self {
            conversations,
            pipeline,
        }
    }

    /// Builds every collaborator from configuration.
    ///
    /// A model that cannot be set up is logged and replaced by its
    /// fallback; tracker and alert channel failures are fatal.
    ///
    /// # Errors
    ///
    /// Returns an error if a duration is out of range, or if the tracker
    /// client or alert channel cannot be built.
    pub fn from_config(config: &ServerConfig) -> Result<Self, Report<StartupError>> {
        let timeout = config.http.timeout();
        let store_config = config.sessions.store_config().map_err(invalid_config)?;
        let window = config.pipeline.window().map_err(invalid_config)?;

        let store: Arc<dyn SessionStore> = Arc::new(InMemorySessionStore::new(store_config));
        let responder = build_responder(config.llm.backend_config(), timeout);
        let conversations = ConversationManager::new(store, responder);

        let tracker: Arc<dyn IssueTracker> = Arc::new(
            SentryClient::new(config.sentry.clone(), timeout).map_err(|e| {
                StartupError::Tracker {
                    reason: e.to_string(),
                }
            })?,
        );
        let tagger = config
            .tagger
            .backend_config()
            .and_then(|backend| build_backend(backend, timeout, "tagger"))
            .map_or_else(Tagger::unavailable, Tagger::new);
        if !tagger.is_available() {
            info!("Classification model unavailable; events get the default classification");
        }
        let notifier = build_notifier(config.notify.slack_webhook_url(), timeout)?;
        let pipeline = TriagePipeline::new(tracker, tagger, notifier).with_window(window);

        Ok(Self::new(conversations, pipeline))
    }
}

fn invalid_config(error: config::ConfigError) -> StartupError {
    StartupError::InvalidConfig {
        reason: error.to_string(),
    }
}

fn build_backend(
    config: LlmBackendConfig,
    timeout: Duration,
    purpose: &'static str,
) -> Option<Arc<dyn LlmBackend>> {
    match OpenAiCompatibleBackend::new(config, timeout) {
        Ok(backend) => {
            info!(purpose, model = backend.model(), "Language model configured");
            Some(Arc::new(backend))
        }
        Err(e) => {
            warn!(purpose, error = %e, "Language model setup failed; using fallback");
            None
        }
    }
}

/// Picks the responder once: model-backed when the chat model is fully
/// configured and its client builds, keyword fallback otherwise.
fn build_responder(config: Option<LlmBackendConfig>, timeout: Duration) -> Arc<dyn Responder> {
    match config.and_then(|config| build_backend(config, timeout, "chat")) {
        Some(backend) => Arc::new(ModelResponder::new(backend)),
        None => {
            info!("Chat model unavailable; replies use the keyword fallback");
            Arc::new(FallbackResponder)
        }
    }
}

fn build_notifier(
    webhook_url: Option<&str>,
    timeout: Duration,
) -> Result<Arc<dyn Notifier>, Report<StartupError>> {
    let Some(url) = webhook_url else {
        return Ok(Arc::new(LogNotifier));
    };
    let notifier = SlackWebhookNotifier::new(url, timeout).map_err(|e| StartupError::Notifier {
        reason: e.to_string(),
    })?;
    Ok(Arc::new(notifier))
}
