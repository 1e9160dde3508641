//! Event triage for feedback-relay.
//!
//! A triage run fetches the tracker's events, keeps the recent ones,
//! classifies each with a language model, writes the classification back
//! as issue tags and alerts on high urgency.

pub mod classification;
pub mod error;
pub mod pipeline;
pub mod recency;
pub mod tagger;

pub use classification::{Classification, Level};
pub use error::PipelineError;
pub use pipeline::{DEFAULT_WINDOW_MINUTES, TriagePipeline, TriageRunReport};
pub use recency::{filter_recent, is_recent};
pub use tagger::{TagOutcome, TagSource, Tagger};
