//! REST API client for the Unsplash HTTP endpoints.
//!
//! Wraps the single endpoint jobs need (`GET /photos/random`) using
//! [`reqwest`]. Every call here is one attempt; retrying lives in
//! [`crate::retry`].

use serde::Deserialize;

use crate::retry::Transient;

/// HTTP client for the Unsplash API.
pub struct UnsplashApi {
    client: reqwest::Client,
    api_url: String,
    access_key: String,
}

/// Response body of `GET /photos/random` (only the fields we read).
#[derive(Debug, Deserialize)]
pub struct RandomPhoto {
    pub id: Option<String>,
    pub urls: PhotoUrls,
}

/// Rendition URLs of a photo.
#[derive(Debug, Deserialize)]
pub struct PhotoUrls {
    pub raw: Option<String>,
    pub full: Option<String>,
    pub regular: Option<String>,
    pub small: Option<String>,
    pub thumb: Option<String>,
}

/// Errors from the Unsplash REST API layer.
#[derive(Debug, thiserror::Error)]
pub enum UnsplashApiError {
    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Unsplash returned a non-2xx status code.
    #[error("Unsplash API error ({status}): {body}")]
    ApiError {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// The response body was not a photo document.
    #[error("Unexpected Unsplash response: {0}")]
    Decode(#[from] serde_json::Error),

    /// The photo carried no usable `urls.small` rendition.
    #[error("Unsplash photo has no small rendition URL")]
    MissingArtifact,

    /// The outbound request limiter was shut down.
    #[error("Unsplash client is shut down")]
    Closed,
}

impl Transient for UnsplashApiError {
    /// Only a server-side fault (HTTP 500) is worth retrying.
    fn is_transient(&self) -> bool {
        matches!(self, UnsplashApiError::ApiError { status: 500, .. })
    }
}

impl UnsplashApi {
    /// Create a new API client.
    ///
    /// * `api_url` - Base URL, e.g. `https://api.unsplash.com`.
    /// * `access_key` - Application access key, sent as `Client-ID`.
    pub fn new(api_url: String, access_key: String) -> Self {
        Self::with_client(reqwest::Client::new(), api_url, access_key)
    }

    /// Create an API client reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, api_url: String, access_key: String) -> Self {
        Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            access_key,
        }
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// Fetch one random photo matching `query`.
    ///
    /// Sends `GET /photos/random?query=..&orientation=..`.
    pub async fn random_photo(
        &self,
        query: &str,
        orientation: &str,
    ) -> Result<RandomPhoto, UnsplashApiError> {
        let response = self
            .client
            .get(format!("{}/photos/random", self.api_url))
            .query(&[("query", query), ("orientation", orientation)])
            .header(
                reqwest::header::AUTHORIZATION,
                format!("Client-ID {}", self.access_key),
            )
            .header("Accept-Version", "v1")
            .send()
            .await?;

        let response = Self::check_status(response).await?;
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Turn a non-2xx response into [`UnsplashApiError::ApiError`].
    async fn check_status(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, UnsplashApiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(UnsplashApiError::ApiError {
            status: status.as_u16(),
            body,
        })
    }
}
