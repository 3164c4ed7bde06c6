//! Job event fan-out.
//!
//! - [`JobEvent`] -- the lifecycle event envelope, each carrying a full job
//!   snapshot.
//! - [`NotificationHub`] -- concurrency-safe registry of observers that
//!   every published event is delivered to.

pub mod hub;
pub mod message;

pub use hub::{NotificationHub, ObserverReceiver};
pub use message::JobEvent;
