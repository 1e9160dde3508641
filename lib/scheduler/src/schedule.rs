//! Fixed-rate job runner.

use crate::error::ScheduleError;
use async_trait::async_trait;
use rootcause::prelude::Report;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

/// A unit of background work run on a schedule.
///
/// Jobs handle their own failures; a run that fails is logged by the job
/// and the next tick proceeds as usual.
#[async_trait]
pub trait ScheduledJob: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Performs one run.
    async fn run(&self);
}

/// Handle to a running schedule.
#[derive(Debug)]
pub struct SchedulerHandle {
    name: String,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl SchedulerHandle {
    /// Returns true until [`shutdown`](Self::shutdown) has completed.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.task.is_some()
    }

    /// Stops the schedule and waits for the task to exit.
    ///
    /// A run in progress is allowed to finish first.
    pub async fn shutdown(&mut self) {
        if let Some(shutdown_tx) = self.shutdown_tx.take() {
            let _ = shutdown_tx.send(());
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
        debug!(job = %self.name, "Schedule stopped");
    }
}

/// Runs `job` immediately and then every `period`, until shut down.
///
/// Ticks are measured from the start time, not from the end of the
/// previous run, so the schedule does not drift.
///
/// # Errors
///
/// Returns `InvalidPeriod` if `period` is zero.
pub fn spawn_fixed_rate(
    job: Arc<dyn ScheduledJob>,
    period: Duration,
) -> Result<SchedulerHandle, Report<ScheduleError>> {
    let name = job.name().to_string();
    if period.is_zero() {
        return Err(ScheduleError::InvalidPeriod { job: name }.into());
    }

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let task = tokio::spawn(run_loop(job, period, shutdown_rx));
    info!(job = %name, period_secs = period.as_secs(), "Schedule started");

    Ok(SchedulerHandle {
        name,
        shutdown_tx: Some(shutdown_tx),
        task: Some(task),
    })
}

async fn run_loop(
    job: Arc<dyn ScheduledJob>,
    period: Duration,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut runs = 0_u64;

    loop {
        tokio::select! {
            _ = interval.tick() => {
                runs = runs.saturating_add(1);
                debug!(job = job.name(), run = runs, "Scheduled run starting");
                job.run().await;
            }
            _ = &mut shutdown_rx => {
                debug!(job = job.name(), runs, "Shutdown requested");
                break;
            }
        }
    }
}
