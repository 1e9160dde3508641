//! Error types for triage runs.

use feedback_relay_core::TriageRunId;
use std::fmt;

/// Errors that abort a triage run.
///
/// Per-event failures never abort a run; they are counted in the report.
#[derive(Debug, Clone)]
pub enum PipelineError {
    /// The event listing could not be fetched.
    FetchFailed { run_id: TriageRunId, reason: String },
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FetchFailed { run_id, reason } => {
                write!(f, "triage run {run_id} aborted, event fetch failed: {reason}")
            }
        }
    }
}

impl std::error::Error for PipelineError {}
