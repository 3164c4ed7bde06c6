//! Message type names for job lifecycle events.
//!
//! Used as the `type` tag of every event pushed to observers, both on the
//! in-process hub and over the WebSocket.

/// A job was created and is pending.
pub const MSG_TYPE_JOB_CREATED: &str = "jobCreated";

/// A job resolved and carries its artifact URL.
pub const MSG_TYPE_JOB_RESOLVED: &str = "jobResolved";

/// A job could not be resolved.
pub const MSG_TYPE_JOB_FAILED: &str = "jobFailed";
