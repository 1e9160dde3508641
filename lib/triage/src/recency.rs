//! Recency filter over fetched events.

use chrono::{DateTime, Duration, Utc};
use feedback_relay_integration::Event;
use tracing::debug;

/// Returns true if the event was created within `[now - window, now]`.
///
/// Events without a parseable creation time are never recent.
#[must_use]
pub fn is_recent(event: &Event, now: DateTime<Utc>, window: Duration) -> bool {
    let Some(created_at) = event.created_at() else {
        debug!(
            event_id = event.id().as_deref().unwrap_or("-"),
            raw = event.created_at_raw().unwrap_or("-"),
            "Excluding event without a usable timestamp"
        );
        return false;
    };

    let age = now - created_at;
    age >= Duration::zero() && age <= window
}

/// Keeps the recent events, preserving arrival order.
#[must_use]
pub fn filter_recent(events: Vec<Event>, now: DateTime<Utc>, window: Duration) -> Vec<Event> {
    events
        .into_iter()
        .filter(|event| is_recent(event, now, window))
        .collect()
}
