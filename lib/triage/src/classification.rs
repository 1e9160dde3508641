//! Theme/severity/urgency classification of a tracker event.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::fmt;
use std::str::FromStr;

/// Theme used when classification fails.
pub const FALLBACK_THEME: &str = "other";

/// A three-step level used for severity and urgency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Low,
    Medium,
    High,
}

impl Level {
    /// Returns the lowercase label.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            other => Err(format!("unknown level '{other}'")),
        }
    }
}

/// The classification written back to an issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    /// Enum-like theme: bug, feature, ui, performance, billing, other.
    pub theme: String,
    pub severity: Level,
    pub urgency: Level,
}

impl Classification {
    /// The safe default: `other` / `low` / `low`.
    #[must_use]
    pub fn fallback() -> Self {
        Self {
            theme: FALLBACK_THEME.to_string(),
            severity: Level::Low,
            urgency: Level::Low,
        }
    }

    /// Reads a classification from a model's JSON object.
    ///
    /// All three fields must be present strings; levels must be
    /// low/medium/high in any case.
    ///
    /// # Errors
    ///
    /// Returns a description of the first missing or invalid field.
    pub fn from_json_object(object: &Map<String, JsonValue>) -> Result<Self, String> {
        let field = |name: &str| -> Result<&str, String> {
            object
                .get(name)
                .and_then(JsonValue::as_str)
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .ok_or_else(|| format!("missing or empty '{name}'"))
        };

        Ok(Self {
            theme: field("theme")?.to_ascii_lowercase(),
            severity: field("severity")?.parse()?,
            urgency: field("urgency")?.parse()?,
        })
    }

    /// Returns true when an alert should be raised.
    #[must_use]
    pub fn is_urgent(&self) -> bool {
        self.urgency == Level::High
    }

    /// Returns the tag pairs written to the tracker.
    #[must_use]
    pub fn as_tags(&self) -> Vec<(String, String)> {
        vec![
            ("theme".to_string(), self.theme.clone()),
            ("severity".to_string(), self.severity.to_string()),
            ("urgency".to_string(), self.urgency.to_string()),
        ]
    }
}

impl Default for Classification {
    fn default() -> Self {
        Self::fallback()
    }
}
