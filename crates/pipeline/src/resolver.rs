//! The external resolution seam.
//!
//! [`Resolver`] is what the orchestrator calls once a job is due. The
//! production implementation is [`UnsplashClient`], whose retry policy
//! already handles transient faults; whatever error comes back is terminal
//! for the job.

use async_trait::async_trait;
use jobsim_core::job::Job;
use jobsim_unsplash::{UnsplashApiError, UnsplashClient};

/// Terminal failure to produce a job's artifact.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error(transparent)]
    Unsplash(#[from] UnsplashApiError),

    #[error("Resolution failed: {0}")]
    Other(String),
}

/// Produces the artifact reference for a due job.
#[async_trait]
pub trait Resolver: Send + Sync {
    /// Return the artifact URL, or a terminal failure.
    async fn resolve(&self, job: &Job) -> Result<String, ResolveError>;
}

#[async_trait]
impl Resolver for UnsplashClient {
    async fn resolve(&self, job: &Job) -> Result<String, ResolveError> {
        tracing::debug!(job_id = %job.id, "Fetching image for job");
        Ok(self.fetch_image_url().await?)
    }
}
