//! Client for the Unsplash random-photo API.
//!
//! - [`api`] -- single-attempt REST calls via `reqwest`.
//! - [`retry`] -- bounded exponential-backoff retry loop.
//! - [`client`] -- [`UnsplashClient`], the retry-wrapped image lookup used
//!   to resolve jobs.

pub mod api;
pub mod client;
pub mod retry;

pub use api::{UnsplashApi, UnsplashApiError};
pub use client::{UnsplashClient, UnsplashConfig};
pub use retry::RetryPolicy;
