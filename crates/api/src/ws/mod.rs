//! WebSocket push of job events.
//!
//! Each connection is attached to the [`NotificationHub`] as one observer
//! and receives every job event as a JSON text frame.
//!
//! [`NotificationHub`]: jobsim_events::NotificationHub

mod handler;

pub use handler::{ws_handler, HEARTBEAT_INTERVAL};
