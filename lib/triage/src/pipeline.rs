//! The triage run: fetch, filter, classify, tag, alert.
//!
//! Events are processed sequentially in arrival order. Only a failed fetch
//! aborts a run; every per-event failure is logged, counted, and skipped
//! past.

use crate::classification::Classification;
use crate::error::PipelineError;
use crate::recency::filter_recent;
use crate::tagger::{TagOutcome, Tagger};
use chrono::{DateTime, Duration, Utc};
use feedback_relay_core::TriageRunId;
use feedback_relay_integration::{Alert, Event, IssueTracker, Notifier};
use rootcause::prelude::Report;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Default recency window.
pub const DEFAULT_WINDOW_MINUTES: i64 = 5;

/// Counters describing a completed run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TriageRunReport {
    pub run_id: TriageRunId,
    /// Events returned by the tracker.
    pub fetched: usize,
    /// Events inside the recency window.
    pub recent: usize,
    /// Events classified by the model.
    pub classified: usize,
    /// Events that received the fallback classification.
    pub defaulted: usize,
    pub updated: usize,
    pub update_failures: usize,
    pub skipped_without_issue: usize,
    pub alerts_sent: usize,
    pub alert_failures: usize,
}

/// What happened to the issue update for one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UpdateOutcome {
    Updated,
    Failed,
    Skipped,
}

/// Orchestrates one triage run over the tracker's recent events.
#[derive(Clone)]
pub struct TriagePipeline {
    tracker: Arc<dyn IssueTracker>,
    tagger: Tagger,
    notifier: Arc<dyn Notifier>,
    window: Duration,
}

impl TriagePipeline {
    /// Creates a pipeline with the default five-minute window.
    #[must_use]
    pub fn new(tracker: Arc<dyn IssueTracker>, tagger: Tagger, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            tracker,
            tagger,
            notifier,
            window: Duration::minutes(DEFAULT_WINDOW_MINUTES),
        }
    }

    /// Overrides the recency window.
    #[must_use]
    pub fn with_window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    /// Returns the recency window.
    #[must_use]
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Returns true if events are classified by a language model.
    #[must_use]
    pub fn is_model_backed(&self) -> bool {
        self.tagger.is_available()
    }

    /// Runs the pipeline against the current time.
    ///
    /// # Errors
    ///
    /// Returns `FetchFailed` if the event listing could not be retrieved.
    pub async fn run(&self) -> Result<TriageRunReport, Report<PipelineError>> {
        self.run_at(Utc::now()).await
    }

    /// Runs the pipeline with an explicit notion of "now".
    ///
    /// # Errors
    ///
    /// Returns `FetchFailed` if the event listing could not be retrieved.
    #[instrument(skip(self), fields(run_id = tracing::field::Empty))]
    pub async fn run_at(&self, now: DateTime<Utc>) -> Result<TriageRunReport, Report<PipelineError>> {
        let run_id = TriageRunId::new();
        tracing::Span::current().record("run_id", tracing::field::display(&run_id));

        let events = self.tracker.fetch_events().await.map_err(|report| {
            warn!(run_id = %run_id, error = %report, "Triage run aborted");
            PipelineError::FetchFailed {
                run_id,
                reason: report.to_string(),
            }
        })?;

        let mut report = TriageRunReport {
            run_id,
            fetched: events.len(),
            ..TriageRunReport::default()
        };

        let recent = filter_recent(events, now, self.window);
        report.recent = recent.len();
        debug!(
            run_id = %run_id,
            fetched = report.fetched,
            recent = report.recent,
            "Filtered events by recency"
        );

        for event in &recent {
            self.process_event(event, &mut report).await;
        }

        info!(
            run_id = %run_id,
            fetched = report.fetched,
            recent = report.recent,
            classified = report.classified,
            defaulted = report.defaulted,
            updated = report.updated,
            update_failures = report.update_failures,
            skipped_without_issue = report.skipped_without_issue,
            alerts_sent = report.alerts_sent,
            alert_failures = report.alert_failures,
            "triage run complete"
        );

        Ok(report)
    }

    async fn process_event(&self, event: &Event, report: &mut TriageRunReport) {
        let event_id = event.id().unwrap_or_else(|| "-".to_string());

        let outcome = self.tagger.classify(event.feedback_text()).await;
        if outcome.is_default() {
            report.defaulted += 1;
        } else {
            report.classified += 1;
        }
        let TagOutcome {
            classification,
            source,
        } = outcome;
        info!(
            event_id = %event_id,
            theme = %classification.theme,
            severity = %classification.severity,
            urgency = %classification.urgency,
            source = ?source,
            "Classified event"
        );

        match self.update_issue(event, &event_id, &classification).await {
            UpdateOutcome::Updated => report.updated += 1,
            UpdateOutcome::Failed => report.update_failures += 1,
            UpdateOutcome::Skipped => report.skipped_without_issue += 1,
        }

        if classification.is_urgent() {
            if self.alert(event, &event_id, &classification).await {
                report.alerts_sent += 1;
            } else {
                report.alert_failures += 1;
            }
        }
    }

    async fn update_issue(
        &self,
        event: &Event,
        event_id: &str,
        classification: &Classification,
    ) -> UpdateOutcome {
        let Some(issue_id) = event.issue_id() else {
            info!(event_id = %event_id, "No issue id on event, skipping tag update");
            return UpdateOutcome::Skipped;
        };

        match self
            .tracker
            .update_issue_tags(&issue_id, &classification.as_tags())
            .await
        {
            Ok(()) => {
                info!(event_id = %event_id, issue_id = %issue_id, "Updated issue tags");
                UpdateOutcome::Updated
            }
            Err(e) => {
                warn!(
                    event_id = %event_id,
                    issue_id = %issue_id,
                    error = %e,
                    "Failed to update issue tags"
                );
                UpdateOutcome::Failed
            }
        }
    }

    async fn alert(&self, event: &Event, event_id: &str, classification: &Classification) -> bool {
        let alert = Alert {
            event_id: event.id(),
            message: event.message().to_string(),
            labels: classification.as_tags(),
        };

        match self.notifier.notify(&alert).await {
            Ok(()) => {
                debug!(event_id = %event_id, channel = self.notifier.channel(), "Alert sent");
                true
            }
            Err(e) => {
                warn!(
                    event_id = %event_id,
                    channel = self.notifier.channel(),
                    error = %e,
                    "Failed to send alert"
                );
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{SecondsFormat, TimeZone};
    use feedback_relay_ai::{
        LlmBackend, LlmError, LlmProvider, LlmRequest, LlmResponse, TokenUsage,
    };
    use feedback_relay_integration::{NotifyError, TrackerError};
    use serde_json::json;
    use std::sync::Mutex;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap()
    }

    fn minutes_ago(minutes: i64) -> String {
        (now() - Duration::minutes(minutes)).to_rfc3339_opts(SecondsFormat::Secs, true)
    }

    #[derive(Default)]
    struct FakeTracker {
        events: Vec<Event>,
        fail_fetch: bool,
        reject_issue: Option<String>,
        updates: Mutex<Vec<(String, Vec<(String, String)>)>>,
    }

    #[async_trait]
    impl IssueTracker for FakeTracker {
        async fn fetch_events(&self) -> Result<Vec<Event>, Report<TrackerError>> {
            if self.fail_fetch {
                return Err(TrackerError::UnexpectedStatus {
                    endpoint: "events".to_string(),
                    status: 503,
                    body: "down".to_string(),
                }
                .into());
            }
            Ok(self.events.clone())
        }

        async fn update_issue_tags(
            &self,
            issue_id: &str,
            tags: &[(String, String)],
        ) -> Result<(), Report<TrackerError>> {
            self.updates
                .lock()
                .unwrap()
                .push((issue_id.to_string(), tags.to_vec()));
            if self.reject_issue.as_deref() == Some(issue_id) {
                return Err(TrackerError::UnexpectedStatus {
                    endpoint: format!("issues/{issue_id}"),
                    status: 404,
                    body: "missing".to_string(),
                }
                .into());
            }
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingNotifier {
        fail: bool,
        alerts: Mutex<Vec<Alert>>,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn notify(&self, alert: &Alert) -> Result<(), Report<NotifyError>> {
            self.alerts.lock().unwrap().push(alert.clone());
            if self.fail {
                return Err(NotifyError::DeliveryFailed {
                    channel: "test".to_string(),
                    reason: "unreachable".to_string(),
                }
                .into());
            }
            Ok(())
        }

        fn channel(&self) -> &'static str {
            "test"
        }
    }

    /// Replies by keyword so each event gets a predictable classification.
    struct KeywordBackend;

    #[async_trait]
    impl LlmBackend for KeywordBackend {
        async fn generate(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
            let content = if request.prompt.contains("crash") {
                r#"{"theme": "bug", "severity": "high", "urgency": "high"}"#
            } else if request.prompt.contains("timeout") {
                return Err(LlmError::Timeout);
            } else if request.prompt.contains("gibberish") {
                "no idea"
            } else {
                r#"{"theme": "feature", "severity": "low", "urgency": "medium"}"#
            };
            Ok(LlmResponse {
                content: content.to_string(),
                usage: TokenUsage::default(),
                model: "keyword".to_string(),
            })
        }

        fn provider(&self) -> LlmProvider {
            LlmProvider::OpenAiCompatible
        }

        fn model(&self) -> &str {
            "keyword"
        }
    }

    fn pipeline(tracker: Arc<FakeTracker>, notifier: Arc<RecordingNotifier>) -> TriagePipeline {
        TriagePipeline::new(tracker, Tagger::new(Arc::new(KeywordBackend)), notifier)
    }

    #[tokio::test]
    async fn tags_recent_events_and_alerts_on_high_urgency() {
        let tracker = Arc::new(FakeTracker {
            events: vec![
                Event::from(json!({
                    "event_id": "e1",
                    "message": "App crash on checkout",
                    "groupID": "100",
                    "dateCreated": minutes_ago(1)
                })),
                Event::from(json!({
                    "event_id": "e2",
                    "message": "Please add dark mode",
                    "group": 200,
                    "dateCreated": minutes_ago(2)
                })),
                Event::from(json!({
                    "event_id": "old",
                    "message": "crash",
                    "groupID": "300",
                    "dateCreated": minutes_ago(60)
                })),
            ],
            ..FakeTracker::default()
        });
        let notifier = Arc::new(RecordingNotifier::default());

        let report = pipeline(tracker.clone(), notifier.clone())
            .run_at(now())
            .await
            .expect("run should complete");

        assert_eq!(report.fetched, 3);
        assert_eq!(report.recent, 2);
        assert_eq!(report.classified, 2);
        assert_eq!(report.updated, 2);
        assert_eq!(report.alerts_sent, 1);

        let updates = tracker.updates.lock().unwrap();
        assert_eq!(updates[0].0, "100");
        assert_eq!(updates[0].1[0], ("theme".to_string(), "bug".to_string()));
        assert_eq!(updates[1].0, "200");

        let alerts = notifier.alerts.lock().unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].event_id.as_deref(), Some("e1"));
        assert_eq!(alerts[0].message, "App crash on checkout");
    }

    #[tokio::test]
    async fn every_event_is_attempted_despite_failures() {
        let tracker = Arc::new(FakeTracker {
            events: vec![
                Event::from(json!({
                    "event_id": "slow",
                    "message": "timeout loading page",
                    "groupID": "1",
                    "dateCreated": minutes_ago(1)
                })),
                Event::from(json!({
                    "event_id": "rejected",
                    "message": "crash in settings",
                    "groupID": "2",
                    "dateCreated": minutes_ago(1)
                })),
                Event::from(json!({
                    "event_id": "orphan",
                    "message": "gibberish",
                    "dateCreated": minutes_ago(1)
                })),
            ],
            reject_issue: Some("2".to_string()),
            ..FakeTracker::default()
        });
        let notifier = Arc::new(RecordingNotifier {
            fail: true,
            ..RecordingNotifier::default()
        });

        let report = pipeline(tracker.clone(), notifier.clone())
            .run_at(now())
            .await
            .expect("run should complete");

        assert_eq!(report.recent, 3);
        assert_eq!(report.classified, 1);
        assert_eq!(report.defaulted, 2);
        assert_eq!(report.updated, 1);
        assert_eq!(report.update_failures, 1);
        assert_eq!(report.skipped_without_issue, 1);
        assert_eq!(report.alerts_sent, 0);
        assert_eq!(report.alert_failures, 1);

        let updates = tracker.updates.lock().unwrap();
        assert_eq!(updates[0].0, "1");
        assert_eq!(updates[0].1, Classification::fallback().as_tags());
    }

    #[tokio::test]
    async fn tags_from_details_when_present() {
        let tracker = Arc::new(FakeTracker {
            events: vec![Event::from(json!({
                "event_id": "e1",
                "message": "User feedback",
                "extra": {"details": "the app keeps crashing"},
                "groupID": "7",
                "dateCreated": minutes_ago(0)
            }))],
            ..FakeTracker::default()
        });
        let notifier = Arc::new(RecordingNotifier::default());

        let report = pipeline(tracker, notifier.clone())
            .run_at(now())
            .await
            .expect("run should complete");

        assert_eq!(report.alerts_sent, 1);
        assert_eq!(notifier.alerts.lock().unwrap()[0].message, "User feedback");
    }

    #[tokio::test]
    async fn fetch_failure_aborts_the_run() {
        let tracker = Arc::new(FakeTracker {
            fail_fetch: true,
            ..FakeTracker::default()
        });
        let notifier = Arc::new(RecordingNotifier::default());

        let result = pipeline(tracker.clone(), notifier).run_at(now()).await;

        let report = result.expect_err("run should abort");
        assert!(report.to_string().contains("event fetch failed"));
        assert!(tracker.updates.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn without_a_model_every_event_gets_the_fallback() {
        let tracker = Arc::new(FakeTracker {
            events: vec![Event::from(json!({
                "event_id": "e1",
                "message": "crash",
                "groupID": "9",
                "dateCreated": minutes_ago(1)
            }))],
            ..FakeTracker::default()
        });
        let notifier = Arc::new(RecordingNotifier::default());

        let report = TriagePipeline::new(tracker, Tagger::unavailable(), notifier.clone())
            .with_window(Duration::minutes(10))
            .run_at(now())
            .await
            .expect("run should complete");

        assert_eq!(report.defaulted, 1);
        assert_eq!(report.updated, 1);
        assert_eq!(report.alerts_sent, 0);
        assert!(notifier.alerts.lock().unwrap().is_empty());
    }
}
