//! Retry-wrapped image lookup used to resolve jobs.

use tokio::sync::Semaphore;

use crate::api::{UnsplashApi, UnsplashApiError};
use crate::retry::{retry, RetryPolicy};

/// Default Unsplash API base URL.
const DEFAULT_API_URL: &str = "https://api.unsplash.com";

/// Default search category.
const DEFAULT_QUERY: &str = "food";

/// Default photo orientation.
const DEFAULT_ORIENTATION: &str = "landscape";

/// Default cap on simultaneous outbound requests.
const DEFAULT_MAX_CONCURRENT_REQUESTS: usize = 4;

/// Unsplash connection settings.
#[derive(Debug, Clone)]
pub struct UnsplashConfig {
    /// Base URL (default: `https://api.unsplash.com`).
    pub api_url: String,
    /// Application access key.
    pub access_key: String,
    /// Search category (default: `food`).
    pub query: String,
    /// Photo orientation (default: `landscape`).
    pub orientation: String,
    /// Maximum outbound requests in flight at once (default: `4`).
    pub max_concurrent_requests: usize,
}

impl UnsplashConfig {
    /// Settings for `access_key` with every other field at its default.
    pub fn new(access_key: impl Into<String>) -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            access_key: access_key.into(),
            query: DEFAULT_QUERY.to_string(),
            orientation: DEFAULT_ORIENTATION.to_string(),
            max_concurrent_requests: DEFAULT_MAX_CONCURRENT_REQUESTS,
        }
    }

    /// Load settings from environment variables with defaults.
    ///
    /// | Env Var                        | Default                    |
    /// |--------------------------------|----------------------------|
    /// | `UNSPLASH_ACCESS_KEY`          | empty (calls will fail)    |
    /// | `UNSPLASH_API_URL`             | `https://api.unsplash.com` |
    /// | `UNSPLASH_QUERY`               | `food`                     |
    /// | `UNSPLASH_MAX_CONCURRENT`      | `4`                        |
    pub fn from_env() -> Self {
        let access_key = std::env::var("UNSPLASH_ACCESS_KEY").unwrap_or_default();
        if access_key.is_empty() {
            tracing::warn!("UNSPLASH_ACCESS_KEY is not set; job resolution will fail");
        }

        let max_concurrent_requests = std::env::var("UNSPLASH_MAX_CONCURRENT")
            .ok()
            .and_then(|v| v.parse().ok())
            .filter(|n: &usize| *n > 0)
            .unwrap_or(DEFAULT_MAX_CONCURRENT_REQUESTS);

        Self {
            api_url: std::env::var("UNSPLASH_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.into()),
            query: std::env::var("UNSPLASH_QUERY").unwrap_or_else(|_| DEFAULT_QUERY.into()),
            max_concurrent_requests,
            ..Self::new(access_key)
        }
    }
}

/// Fetches one image URL per call, retrying server faults with backoff.
///
/// Each attempt holds a permit from a bounded semaphore for the duration of
/// the HTTP exchange; the permit is released on drop, on every exit path.
pub struct UnsplashClient {
    api: UnsplashApi,
    query: String,
    orientation: String,
    policy: RetryPolicy,
    permits: Semaphore,
}

impl UnsplashClient {
    pub fn new(config: UnsplashConfig) -> Self {
        Self {
            api: UnsplashApi::new(config.api_url, config.access_key),
            query: config.query,
            orientation: config.orientation,
            policy: RetryPolicy::default(),
            permits: Semaphore::new(config.max_concurrent_requests.max(1)),
        }
    }

    /// Replace the default retry policy.
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Fetch the small rendition URL of a random photo.
    pub async fn fetch_image_url(&self) -> Result<String, UnsplashApiError> {
        retry(&self.policy, move |attempt| self.attempt(attempt)).await
    }

    async fn attempt(&self, attempt: u32) -> Result<String, UnsplashApiError> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| UnsplashApiError::Closed)?;

        tracing::debug!(attempt, query = %self.query, "Requesting random photo");
        let photo = self.api.random_photo(&self.query, &self.orientation).await?;

        photo
            .urls
            .small
            .filter(|url| !url.trim().is_empty())
            .ok_or(UnsplashApiError::MissingArtifact)
    }
}
