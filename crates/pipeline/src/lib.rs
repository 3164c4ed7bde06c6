//! Job lifecycle engine.
//!
//! - [`scheduler`] -- arms each pending job's deferred resolution and
//!   re-arms every pending job after a restart.
//! - [`resolver`] -- the [`Resolver`] seam and its Unsplash implementation.
//! - [`orchestrator`] -- [`JobOrchestrator`], which creates jobs, resolves
//!   them when due, persists the outcome and publishes every transition.

pub mod orchestrator;
pub mod resolver;
pub mod scheduler;

pub use orchestrator::{JobOrchestrator, ResolveOutcome};
pub use resolver::{ResolveError, Resolver};
pub use scheduler::{ArmOutcome, JobScheduler};
