//! Error types for the scheduler crate.

use std::fmt;

/// Errors from schedule operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScheduleError {
    /// The period was zero.
    InvalidPeriod { job: String },
}

impl fmt::Display for ScheduleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidPeriod { job } => {
                write!(f, "schedule period for job '{job}' must be greater than zero")
            }
        }
    }
}

impl std::error::Error for ScheduleError {}
