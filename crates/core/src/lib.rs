//! Domain types shared by every jobsim crate.
//!
//! - [`job`] -- the [`Job`](job::Job) entity, its status machine and the
//!   execution-duration range new jobs are sampled from.
//! - [`job_events`] -- event type names pushed to observers.
//! - [`error`] -- [`CoreError`](error::CoreError), the domain error type.

pub mod error;
pub mod job;
pub mod job_events;
pub mod types;
