//! Background jobs run on fixed-rate schedules.

use async_trait::async_trait;
use feedback_relay_conversation::SessionStore;
use feedback_relay_scheduler::ScheduledJob;
use feedback_relay_triage::TriagePipeline;
use std::sync::Arc;
use tracing::{debug, warn};

/// Runs the triage pipeline on each tick.
pub struct TriageJob {
    pipeline: TriagePipeline,
}

impl TriageJob {
    #[must_use]
    pub fn new(pipeline: TriagePipeline) -> Self {
        Self { pipeline }
    }
}

#[async_trait]
impl ScheduledJob for TriageJob {
    fn name(&self) -> &str {
        "triage"
    }

    async fn run(&self) {
        // The pipeline logs its own completion report.
        if let Err(e) = self.pipeline.run().await {
            warn!(error = %e, "Scheduled triage run failed");
        }
    }
}

/// Drops expired conversation sessions on each tick.
pub struct SessionSweepJob {
    store: Arc<dyn SessionStore>,
}

impl SessionSweepJob {
    #[must_use]
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ScheduledJob for SessionSweepJob {
    fn name(&self) -> &str {
        "session-sweep"
    }

    async fn run(&self) {
        match self.store.purge_expired().await {
            Ok(purged) if purged > 0 => {
                debug!(purged, "Periodic session sweep");
            }
            Ok(_) => {}
            Err(e) => {
                warn!(error = %e, "Failed to sweep expired sessions");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use feedback_relay_conversation::{InMemorySessionStore, Message, SessionStoreConfig};

    #[tokio::test]
    async fn sweep_purges_expired_sessions() {
        let store = Arc::new(InMemorySessionStore::new(SessionStoreConfig {
            max_sessions: 10,
            ttl: chrono::Duration::minutes(-1),
        }));
        store
            .append(&"s1".into(), Message::user("hi"))
            .await
            .expect("append");

        SessionSweepJob::new(store.clone()).run().await;
        assert_eq!(store.purge_expired().await.expect("purge"), 0);
    }
}
