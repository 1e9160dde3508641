//! Read-only view over an issue tracker event.
//!
//! Events are kept as the raw JSON object the tracker returned. Accessors
//! look up the handful of fields triage needs, trying the alternative field
//! names the tracker uses in a fixed order.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

/// Fields that may carry the issue (group) id, in precedence order.
pub const ISSUE_ID_FIELDS: [&str; 4] = ["groupID", "group", "issue", "issue_id"];

/// Fields that may carry the creation time, in precedence order.
pub const CREATED_AT_FIELDS: [&str; 2] = ["dateCreated", "timestamp"];

/// An event as returned by the tracker.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Event(Map<String, JsonValue>);

impl Event {
    /// Wraps a raw event object.
    #[must_use]
    pub fn new(fields: Map<String, JsonValue>) -> Self {
        Self(fields)
    }

    /// Returns the raw fields.
    #[must_use]
    pub fn fields(&self) -> &Map<String, JsonValue> {
        &self.0
    }

    /// Returns the event id (`event_id`, else `id`).
    #[must_use]
    pub fn id(&self) -> Option<String> {
        ["event_id", "id"]
            .iter()
            .find_map(|key| self.0.get(*key).and_then(scalar_to_string))
    }

    /// Returns the top-level message, or an empty string.
    #[must_use]
    pub fn message(&self) -> &str {
        self.0
            .get("message")
            .and_then(JsonValue::as_str)
            .unwrap_or_default()
    }

    /// Returns `extra.details` when present and non-empty.
    #[must_use]
    pub fn details(&self) -> Option<&str> {
        self.0
            .get("extra")
            .and_then(|extra| extra.get("details"))
            .and_then(JsonValue::as_str)
            .filter(|details| !details.is_empty())
    }

    /// Returns the free text to classify: details, else message, else empty.
    #[must_use]
    pub fn feedback_text(&self) -> &str {
        self.details().unwrap_or_else(|| self.message())
    }

    /// Returns the raw creation timestamp string, if any.
    #[must_use]
    pub fn created_at_raw(&self) -> Option<&str> {
        CREATED_AT_FIELDS.iter().find_map(|key| {
            self.0
                .get(*key)
                .and_then(JsonValue::as_str)
                .filter(|raw| !raw.is_empty())
        })
    }

    /// Returns the parsed creation time, if present and parseable.
    #[must_use]
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at_raw().and_then(parse_timestamp)
    }

    /// Resolves the issue id using [`ISSUE_ID_FIELDS`] precedence.
    ///
    /// String and integer values are accepted; empty strings are skipped.
    #[must_use]
    pub fn issue_id(&self) -> Option<String> {
        ISSUE_ID_FIELDS
            .iter()
            .find_map(|key| self.0.get(*key).and_then(scalar_to_string))
    }
}

impl From<JsonValue> for Event {
    fn from(value: JsonValue) -> Self {
        match value {
            JsonValue::Object(map) => Self(map),
            _ => Self::default(),
        }
    }
}

/// Parses a tracker timestamp into UTC.
///
/// Accepts RFC 3339 (`Z` or numeric offset) and zone-less ISO 8601
/// date-times, which are taken to be UTC.
#[must_use]
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }

    let naive = raw.strip_suffix('Z').unwrap_or(raw);
    NaiveDateTime::parse_from_str(naive, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(naive, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
        .map(|dt| dt.and_utc())
}

fn scalar_to_string(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::String(s) if !s.is_empty() => Some(s.clone()),
        JsonValue::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
