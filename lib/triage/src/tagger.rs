//! Language-model classification of feedback text.
//!
//! Tagging never fails: every problem collapses to the fallback
//! classification, and the outcome records why.

use crate::classification::Classification;
use feedback_relay_ai::{LlmBackend, LlmCall, LlmError, LlmFailureKind};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};

/// Where a classification came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "reason")]
pub enum TagSource {
    /// Parsed from the model reply.
    Model,
    /// The fallback was used for the given reason.
    Default(LlmFailureKind),
}

/// A classification together with its provenance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagOutcome {
    pub classification: Classification,
    pub source: TagSource,
}

impl TagOutcome {
    fn fallback(kind: LlmFailureKind) -> Self {
        Self {
            classification: Classification::fallback(),
            source: TagSource::Default(kind),
        }
    }

    /// Returns true if the fallback classification was used.
    #[must_use]
    pub fn is_default(&self) -> bool {
        matches!(self.source, TagSource::Default(_))
    }
}

/// Classifies feedback text into theme, severity and urgency.
#[derive(Clone)]
pub struct Tagger {
    backend: Option<Arc<dyn LlmBackend>>,
}

impl std::fmt::Debug for Tagger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tagger")
            .field("model", &self.backend.as_ref().map(|b| b.model().to_string()))
            .finish()
    }
}

impl Tagger {
    /// Creates a tagger backed by the given model.
    #[must_use]
    pub fn new(backend: Arc<dyn LlmBackend>) -> Self {
        Self {
            backend: Some(backend),
        }
    }

    /// Creates a tagger with no model; every event gets the fallback.
    #[must_use]
    pub fn unavailable() -> Self {
        Self { backend: None }
    }

    /// Returns true when a model backend is configured.
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.backend.is_some()
    }

    /// Classifies `text`.
    pub async fn classify(&self, text: &str) -> TagOutcome {
        let Some(backend) = self.backend.as_deref() else {
            debug!("No classification model configured, using fallback");
            return TagOutcome::fallback(LlmFailureKind::Unavailable);
        };

        let call = LlmCall::new(classification_prompt(text)).with_temperature(0.0);
        let object = match call.execute_json(backend).await {
            Ok(object) => object,
            Err(e) => {
                warn!(error = %e, kind = %e.kind(), "Classification call failed, using fallback");
                return TagOutcome::fallback(e.kind());
            }
        };

        match Classification::from_json_object(&object) {
            Ok(classification) => TagOutcome {
                classification,
                source: TagSource::Model,
            },
            Err(reason) => {
                let e = LlmError::ResponseParseFailed { reason };
                warn!(error = %e, "Classification reply rejected, using fallback");
                TagOutcome::fallback(e.kind())
            }
        }
    }
}

fn classification_prompt(text: &str) -> String {
    format!(
        "Analyze the following customer feedback and assign:\n\
         - theme (one of: bug, feature, ui, performance, billing, other)\n\
         - severity (low, medium, high)\n\
         - urgency (low, medium, high)\n\
         Feedback: \"{text}\"\n\
         Respond only in JSON: {{\"theme\": \"...\", \"severity\": \"...\", \"urgency\": \"...\"}}"
    )
}
