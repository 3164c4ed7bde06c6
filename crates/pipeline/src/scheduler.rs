//! Deferred resolution timers.
//!
//! [`JobScheduler`] decides whether a job is due now or must wait. Waiting
//! jobs get one tracked Tokio task per id that sleeps,
//! re-reads the job from the store and recomputes the remaining time from
//! persisted fields, so a timer that wakes early simply sleeps again and a
//! job that turned terminal in the meantime is dropped. Due job ids are
//! handed to the orchestrator over a channel.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use jobsim_core::job::Job;
use jobsim_core::types::JobId;
use jobsim_db::JobStore;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

/// Receiving end of the due-job channel, drained by the orchestrator.
pub type DueReceiver = mpsc::UnboundedReceiver<JobId>;

/// What [`JobScheduler::arm`] did with a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArmOutcome {
    /// The job is terminal and was not armed.
    Skipped,
    /// A timer for this job is already running.
    AlreadyArmed,
    /// The job was due and has been handed off for resolution.
    DueNow,
    /// A timer was armed for the remaining duration.
    Deferred(Duration),
}

/// Arms and tracks deferred job resolutions.
pub struct JobScheduler {
    store: Arc<JobStore>,
    due_tx: mpsc::UnboundedSender<JobId>,
    armed: Arc<Mutex<HashSet<JobId>>>,
    tracker: TaskTracker,
    cancel: CancellationToken,
}

impl JobScheduler {
    /// Create a scheduler reading job state from `store`.
    ///
    /// Returns the receiver on which due job ids are delivered.
    pub fn new(store: Arc<JobStore>) -> (Self, DueReceiver) {
        let (due_tx, due_rx) = mpsc::unbounded_channel();
        let scheduler = Self {
            store,
            due_tx,
            armed: Arc::new(Mutex::new(HashSet::new())),
            tracker: TaskTracker::new(),
            cancel: CancellationToken::new(),
        };
        (scheduler, due_rx)
    }

    /// Arm `job` for resolution.
    ///
    /// Terminal jobs are never armed. Overdue jobs are handed off
    /// immediately; others get a deferred timer unless one is already
    /// running for the same id.
    pub async fn arm(&self, job: &Job) -> ArmOutcome {
        if !job.is_pending() {
            tracing::debug!(job_id = %job.id, status = %job.status, "Not arming terminal job");
            return ArmOutcome::Skipped;
        }

        let remaining = job.remaining(Utc::now());
        if remaining.is_zero() {
            self.fire(job.id);
            return ArmOutcome::DueNow;
        }

        if !self.armed.lock().await.insert(job.id) {
            tracing::debug!(job_id = %job.id, "Job already armed");
            return ArmOutcome::AlreadyArmed;
        }

        tracing::debug!(
            job_id = %job.id,
            remaining_ms = remaining.as_millis() as u64,
            "Armed job timer",
        );
        self.tracker.spawn(wait_until_due(
            job.id,
            remaining,
            Arc::clone(&self.store),
            self.due_tx.clone(),
            Arc::clone(&self.armed),
            self.cancel.clone(),
        ));
        ArmOutcome::Deferred(remaining)
    }

    /// Arm every pending job in the store. Called once on process start.
    ///
    /// Returns the number of jobs that were armed or handed off.
    pub async fn rearm_pending(&self) -> usize {
        let pending = self.store.list_pending().await;
        let mut armed = 0;
        for job in &pending {
            if matches!(
                self.arm(job).await,
                ArmOutcome::DueNow | ArmOutcome::Deferred(_)
            ) {
                armed += 1;
            }
        }
        tracing::info!(pending = pending.len(), armed, "Re-armed pending jobs");
        armed
    }

    /// Number of deferred timers currently running.
    pub async fn armed_count(&self) -> usize {
        self.armed.lock().await.len()
    }

    /// Cancel every running timer and wait for the tasks to exit.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        self.tracker.close();
        self.tracker.wait().await;
        tracing::info!("Job scheduler stopped");
    }

    fn fire(&self, id: JobId) {
        tracing::debug!(job_id = %id, "Job is due");
        if self.due_tx.send(id).is_err() {
            tracing::warn!(job_id = %id, "Due job dropped, orchestrator is not running");
        }
    }
}

/// Body of a deferred timer task.
async fn wait_until_due(
    id: JobId,
    mut wait: Duration,
    store: Arc<JobStore>,
    due_tx: mpsc::UnboundedSender<JobId>,
    armed: Arc<Mutex<HashSet<JobId>>>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::trace!(job_id = %id, "Job timer cancelled");
                break;
            }
            _ = tokio::time::sleep(wait) => {}
        }

        match store.get_by_id(id).await {
            None => {
                tracing::warn!(job_id = %id, "Armed job no longer exists");
                break;
            }
            Some(job) if !job.is_pending() => {
                tracing::debug!(job_id = %id, status = %job.status, "Armed job already terminal");
                break;
            }
            Some(job) => {
                wait = job.remaining(Utc::now());
                if wait.is_zero() {
                    tracing::debug!(job_id = %id, "Job is due");
                    if due_tx.send(id).is_err() {
                        tracing::warn!(job_id = %id, "Due job dropped, orchestrator is not running");
                    }
                    break;
                }
                tracing::debug!(
                    job_id = %id,
                    remaining_ms = wait.as_millis() as u64,
                    "Timer woke early, waiting again",
                );
            }
        }
    }

    armed.lock().await.remove(&id);
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
