//! External collaborators for feedback-relay.
//!
//! This crate provides:
//!
//! - **Events**: a read-only view over tracker event records
//! - **Issue tracker**: fetching events and writing issue tags (Sentry)
//! - **Notifiers**: one-way alert delivery (log stream, Slack webhook)

pub mod error;
pub mod event;
pub mod notifier;
pub mod tracker;

pub use error::{NotifyError, TrackerError};
pub use event::{Event, parse_timestamp};
pub use notifier::{Alert, LogNotifier, Notifier, SlackWebhookNotifier};
pub use tracker::{IssueTracker, SentryClient, SentryConfig};
