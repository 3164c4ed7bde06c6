//! Job lifecycle orchestration.
//!
//! [`JobOrchestrator`] ties the store, scheduler, resolver and hub
//! together. It is the only writer of job status: every transition goes
//! through [`JobStore::modify`], which re-checks the persisted status, so a
//! job that is fired twice still resolves at most once.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;
use jobsim_core::error::CoreError;
use jobsim_core::job::{ExecutionRange, Job};
use jobsim_core::types::JobId;
use jobsim_db::{JobStore, StoreError};
use jobsim_events::{JobEvent, NotificationHub};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::resolver::Resolver;
use crate::scheduler::{DueReceiver, JobScheduler};

/// Result of one [`JobOrchestrator::resolve_job`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveOutcome {
    /// The job was resolved and `jobResolved` was published.
    Resolved(Job),
    /// The job failed and `jobFailed` was published.
    Failed(Job),
    /// Nothing happened: the job is unknown, already terminal, already
    /// being resolved, or its outcome could not be persisted.
    Skipped,
}

/// Creates jobs, resolves them when due and publishes every transition.
pub struct JobOrchestrator {
    store: Arc<JobStore>,
    hub: Arc<NotificationHub>,
    resolver: Arc<dyn Resolver>,
    scheduler: JobScheduler,
    execution_range: ExecutionRange,
    in_flight: Mutex<HashSet<JobId>>,
    tasks: TaskTracker,
    cancel: CancellationToken,
}

impl JobOrchestrator {
    /// Build the orchestrator, start its due-job loop and re-arm every
    /// pending job found in the store.
    pub async fn start(
        store: Arc<JobStore>,
        hub: Arc<NotificationHub>,
        resolver: Arc<dyn Resolver>,
        execution_range: ExecutionRange,
    ) -> Arc<Self> {
        let (scheduler, due_rx) = JobScheduler::new(Arc::clone(&store));
        let orchestrator = Arc::new(Self {
            store,
            hub,
            resolver,
            scheduler,
            execution_range,
            in_flight: Mutex::new(HashSet::new()),
            tasks: TaskTracker::new(),
            cancel: CancellationToken::new(),
        });

        orchestrator
            .tasks
            .spawn(Arc::clone(&orchestrator).run(due_rx));
        orchestrator.recover_pending().await;

        orchestrator
    }

    pub fn scheduler(&self) -> &JobScheduler {
        &self.scheduler
    }

    /// Create a pending job, publish `jobCreated` and arm its timer.
    ///
    /// Returns as soon as the job is persisted; resolution happens later.
    pub async fn create_job(&self) -> Result<Job, StoreError> {
        let job = Job::pending(
            JobId::new_v4(),
            self.execution_range.sample(),
            Utc::now(),
        );
        self.store.append(job.clone()).await?;

        tracing::info!(
            job_id = %job.id,
            execution_duration = job.execution_duration,
            "Job created",
        );

        self.hub.publish(JobEvent::Created(job.clone())).await;
        self.scheduler.arm(&job).await;
        Ok(job)
    }

    /// All jobs in creation order.
    pub async fn list_jobs(&self) -> Vec<Job> {
        self.store.list_all().await
    }

    /// One job, or `None` if the id is unknown.
    pub async fn get_job(&self, id: JobId) -> Option<Job> {
        self.store.get_by_id(id).await
    }

    /// Re-arm every pending job. Returns how many were armed.
    pub async fn recover_pending(&self) -> usize {
        self.scheduler.rearm_pending().await
    }

    /// Resolve a due job.
    ///
    /// Claims the job first, then re-reads it; jobs another task is already
    /// resolving are left alone, as are unknown or terminal jobs. Resolver
    /// failures are absorbed here and become a `failed` job.
    pub async fn resolve_job(&self, id: JobId) -> ResolveOutcome {
        let Some(_guard) = InFlight::claim(&self.in_flight, id) else {
            tracing::debug!(job_id = %id, "Job is already being resolved");
            return ResolveOutcome::Skipped;
        };
        let Some(job) = self.store.get_by_id(id).await else {
            tracing::warn!(job_id = %id, "Due job not found");
            return ResolveOutcome::Skipped;
        };
        if !job.is_pending() {
            tracing::debug!(job_id = %id, status = %job.status, "Due job already terminal");
            return ResolveOutcome::Skipped;
        }

        match self.resolver.resolve(&job).await {
            Ok(artifact) if !artifact.trim().is_empty() => self.mark_resolved(id, artifact).await,
            Ok(_) => {
                tracing::warn!(job_id = %id, "Resolver returned an empty artifact");
                self.mark_failed(id).await
            }
            Err(e) => {
                tracing::warn!(job_id = %id, error = %e, "Job resolution failed");
                self.mark_failed(id).await
            }
        }
    }

    /// Stop timers and the due-job loop, then wait for in-flight
    /// resolutions to finish.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        self.scheduler.shutdown().await;
        self.tasks.close();
        self.tasks.wait().await;
        tracing::info!("Job orchestrator stopped");
    }

    /// Drain due job ids, resolving each in its own tracked task.
    async fn run(self: Arc<Self>, mut due: DueReceiver) {
        tracing::info!("Job orchestrator started");
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                next = due.recv() => {
                    let Some(id) = next else { break };
                    let this = Arc::clone(&self);
                    self.tasks.spawn(async move {
                        this.resolve_job(id).await;
                    });
                }
            }
        }
        tracing::debug!("Due-job loop exited");
    }

    async fn mark_resolved(&self, id: JobId, artifact: String) -> ResolveOutcome {
        match self.store.modify(id, |job| job.resolved(artifact)).await {
            Ok(job) => {
                tracing::info!(job_id = %id, result = ?job.result, "Job resolved");
                self.hub.publish(JobEvent::Resolved(job.clone())).await;
                ResolveOutcome::Resolved(job)
            }
            Err(e) => Self::transition_rejected(id, e),
        }
    }

    async fn mark_failed(&self, id: JobId) -> ResolveOutcome {
        match self.store.modify(id, |job| job.failed()).await {
            Ok(job) => {
                tracing::info!(job_id = %id, "Job failed");
                self.hub.publish(JobEvent::Failed(job.clone())).await;
                ResolveOutcome::Failed(job)
            }
            Err(e) => Self::transition_rejected(id, e),
        }
    }

    fn transition_rejected(id: JobId, err: StoreError) -> ResolveOutcome {
        match err {
            StoreError::Rejected(CoreError::Conflict(_)) => {
                tracing::debug!(job_id = %id, "Job became terminal elsewhere, nothing to do");
            }
            other => {
                tracing::error!(job_id = %id, error = %other, "Failed to persist job outcome");
            }
        }
        ResolveOutcome::Skipped
    }
}

/// Marks a job as being resolved; the mark is released on drop.
struct InFlight<'a> {
    set: &'a Mutex<HashSet<JobId>>,
    id: JobId,
}

impl<'a> InFlight<'a> {
    /// `None` if the job is already claimed.
    fn claim(set: &'a Mutex<HashSet<JobId>>, id: JobId) -> Option<Self> {
        let inserted = set
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id);
        inserted.then_some(Self { set, id })
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.set
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.id);
    }
}
