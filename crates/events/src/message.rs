//! The job lifecycle event envelope.

use jobsim_core::job::Job;
use jobsim_core::job_events::{MSG_TYPE_JOB_CREATED, MSG_TYPE_JOB_FAILED, MSG_TYPE_JOB_RESOLVED};
use serde::{Deserialize, Serialize};

/// A job state change, carrying the full job snapshot after the change.
///
/// Serializes as `{"type": "jobResolved", "job": {...}}` so an observer can
/// merge the snapshot into its view without any earlier events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "job")]
pub enum JobEvent {
    #[serde(rename = "jobCreated")]
    Created(Job),
    #[serde(rename = "jobResolved")]
    Resolved(Job),
    #[serde(rename = "jobFailed")]
    Failed(Job),
}

impl JobEvent {
    /// Wire name of the event, e.g. `"jobCreated"`.
    pub fn event_type(&self) -> &'static str {
        match self {
            JobEvent::Created(_) => MSG_TYPE_JOB_CREATED,
            JobEvent::Resolved(_) => MSG_TYPE_JOB_RESOLVED,
            JobEvent::Failed(_) => MSG_TYPE_JOB_FAILED,
        }
    }

    pub fn job(&self) -> &Job {
        match self {
            JobEvent::Created(job) | JobEvent::Resolved(job) | JobEvent::Failed(job) => job,
        }
    }

    /// `true` for `jobResolved` and `jobFailed`.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobEvent::Created(_))
    }

    /// JSON text frame sent to WebSocket observers.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
