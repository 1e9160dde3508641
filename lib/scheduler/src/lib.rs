//! Fixed-rate background jobs for feedback-relay.
//!
//! A job runs on absolute-interval ticks in its own task. Runs of one job
//! never overlap: a tick that arrives while a run is in progress is skipped.

pub mod error;
pub mod schedule;

pub use error::ScheduleError;
pub use schedule::{ScheduledJob, SchedulerHandle, spawn_fixed_rate};
