//! The job entity and its one-way status machine.
//!
//! A [`Job`] starts `pending` and moves exactly once to `resolved` or
//! `failed`. The transition helpers return a new snapshot instead of
//! mutating in place so that callers (the store's transactional update)
//! can reject the change without touching the persisted record.

use std::time::Duration;

use chrono::{TimeDelta, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::{JobId, Timestamp};

// ---------------------------------------------------------------------------
// JobStatus
// ---------------------------------------------------------------------------

/// Lifecycle status of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Resolved,
    Failed,
}

impl JobStatus {
    /// `resolved` and `failed` never change again.
    pub fn is_terminal(self) -> bool {
        !matches!(self, JobStatus::Pending)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Resolved => "resolved",
            JobStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Job
// ---------------------------------------------------------------------------

/// A simulated background job.
///
/// Serialized in camelCase; this is both the persisted record and the
/// snapshot carried by every observer event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: JobId,
    pub status: JobStatus,
    /// Artifact URL; present iff `status == Resolved`.
    pub result: Option<String>,
    /// Whole seconds the job stays pending before resolution is attempted.
    pub execution_duration: u64,
    pub started_at: Timestamp,
}

impl Job {
    /// A freshly created pending job.
    pub fn pending(id: JobId, execution_duration: u64, started_at: Timestamp) -> Self {
        Self {
            id,
            status: JobStatus::Pending,
            result: None,
            execution_duration,
            started_at,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == JobStatus::Pending
    }

    /// Time left before the job is due, measured from `now`.
    ///
    /// Derived only from persisted fields, so it can be recomputed after a
    /// restart. Saturates at zero once the duration has elapsed. A
    /// `started_at` in the future counts as zero elapsed time.
    pub fn remaining(&self, now: Timestamp) -> Duration {
        let elapsed = (now - self.started_at).to_std().unwrap_or(Duration::ZERO);
        Duration::from_secs(self.execution_duration).saturating_sub(elapsed)
    }

    /// The instant at which the job becomes due.
    pub fn due_at(&self) -> Timestamp {
        i64::try_from(self.execution_duration)
            .ok()
            .and_then(TimeDelta::try_seconds)
            .and_then(|delta| self.started_at.checked_add_signed(delta))
            .unwrap_or(chrono::DateTime::<Utc>::MAX_UTC)
    }

    /// Snapshot of this job moved to `resolved` with the given artifact.
    ///
    /// Fails with [`CoreError::Conflict`] if the job is already terminal and
    /// with [`CoreError::Validation`] if the artifact reference is empty.
    pub fn resolved(&self, artifact: impl Into<String>) -> Result<Job, CoreError> {
        self.ensure_pending(JobStatus::Resolved)?;
        let artifact = artifact.into();
        if artifact.trim().is_empty() {
            return Err(CoreError::Validation(
                "a resolved job needs a non-empty result".into(),
            ));
        }
        Ok(Job {
            status: JobStatus::Resolved,
            result: Some(artifact),
            ..self.clone()
        })
    }

    /// Snapshot of this job moved to `failed`; the result stays empty.
    pub fn failed(&self) -> Result<Job, CoreError> {
        self.ensure_pending(JobStatus::Failed)?;
        Ok(Job {
            status: JobStatus::Failed,
            result: None,
            ..self.clone()
        })
    }

    /// `true` when `result` is present exactly for resolved jobs.
    pub fn is_consistent(&self) -> bool {
        match (self.status, &self.result) {
            (JobStatus::Resolved, Some(url)) => !url.trim().is_empty(),
            (JobStatus::Pending | JobStatus::Failed, None) => true,
            _ => false,
        }
    }

    fn ensure_pending(&self, target: JobStatus) -> Result<(), CoreError> {
        if self.status.is_terminal() {
            return Err(CoreError::Conflict(format!(
                "job {} is already {} and cannot become {target}",
                self.id, self.status
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ExecutionRange
// ---------------------------------------------------------------------------

/// Range new execution durations are drawn from:
/// `min_secs + step_secs * k` for a uniform `k` in `0..steps`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionRange {
    pub min_secs: u64,
    pub step_secs: u64,
    pub steps: u64,
}

impl ExecutionRange {
    /// Every job gets exactly `secs`.
    pub fn fixed(secs: u64) -> Self {
        Self {
            min_secs: secs,
            step_secs: 0,
            steps: 1,
        }
    }

    /// Largest duration this range can produce.
    pub fn max_secs(&self) -> u64 {
        self.min_secs
            .saturating_add(self.step_secs.saturating_mul(self.steps.saturating_sub(1)))
    }

    /// Draw a duration using the thread-local RNG.
    pub fn sample(&self) -> u64 {
        self.sample_with(&mut rand::rng())
    }

    pub fn sample_with<R: Rng + ?Sized>(&self, rng: &mut R) -> u64 {
        let k = rng.random_range(0..self.steps.max(1));
        self.min_secs.saturating_add(self.step_secs.saturating_mul(k))
    }
}

impl Default for ExecutionRange {
    /// 5 to 300 seconds in steps of 5.
    fn default() -> Self {
        Self {
            min_secs: 5,
            step_secs: 5,
            steps: 60,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
