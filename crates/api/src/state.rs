use std::sync::Arc;

use jobsim_events::NotificationHub;
use jobsim_pipeline::JobOrchestrator;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable; everything inside is behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Job lifecycle: creation, lookup, deferred resolution.
    pub orchestrator: Arc<JobOrchestrator>,
    /// Fan-out of job events to WebSocket observers.
    pub hub: Arc<NotificationHub>,
}
