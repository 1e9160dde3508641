//! Welcome messages keyed by the page the widget is embedded in.

use crate::message::ChatContext;
use serde_json::Value as JsonValue;

/// The kind of page a conversation starts from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageType {
    Payment,
    Account,
    Support,
    General,
}

impl PageType {
    /// Reads `pageType` from the widget context. Unknown or missing values
    /// map to [`PageType::General`].
    #[must_use]
    pub fn from_context(context: Option<&ChatContext>) -> Self {
        match context
            .and_then(|context| context.get("pageType"))
            .and_then(JsonValue::as_str)
        {
            Some("payment") => Self::Payment,
            Some("account") => Self::Account,
            Some("support") => Self::Support,
            _ => Self::General,
        }
    }

    /// Returns the greeting for this page.
    #[must_use]
    pub fn welcome_message(self) -> &'static str {
        match self {
            Self::Payment => {
                "Hello! I'm here to help with your payment experience. How can I assist you today?"
            }
            Self::Account => {
                "Hello! I'm here to help with your account. What can I help you with?"
            }
            Self::Support => "Hello! I'm here to provide support. How can I help you?",
            Self::General => "Hello! I'm your AI assistant. How can I help you today?",
        }
    }
}
