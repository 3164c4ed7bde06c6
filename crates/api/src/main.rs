use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use jobsim_core::job::ExecutionRange;
use jobsim_db::JobStore;
use jobsim_events::NotificationHub;
use jobsim_pipeline::JobOrchestrator;
use jobsim_unsplash::UnsplashClient;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use jobsim_api::config::ServerConfig;
use jobsim_api::router::build_app_router;
use jobsim_api::state::AppState;

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "jobsim_api=debug,jobsim_pipeline=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Server failed");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    // --- Configuration ---
    let config = ServerConfig::from_env()?;
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Job store ---
    let store = Arc::new(JobStore::open(&config.job_store_path).await?);

    // --- Notification hub ---
    let hub = Arc::new(NotificationHub::new());

    // --- Resolver ---
    let resolver = Arc::new(UnsplashClient::new(config.unsplash.clone()));
    tracing::info!(
        api_url = %config.unsplash.api_url,
        query = %config.unsplash.query,
        "Unsplash client created",
    );

    // --- Orchestrator (re-arms pending jobs) ---
    let orchestrator = JobOrchestrator::start(
        Arc::clone(&store),
        Arc::clone(&hub),
        resolver,
        ExecutionRange::default(),
    )
    .await;
    tracing::info!("Job orchestrator started");

    // --- App state ---
    let state = AppState {
        config: Arc::new(config.clone()),
        orchestrator: Arc::clone(&orchestrator),
        hub: Arc::clone(&hub),
    };

    // --- Router ---
    let app = build_app_router(state, &config)?;

    // --- Start server ---
    let addr = SocketAddr::new(config.host.parse()?, config.port);
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    // Stop timers first, then let in-flight resolutions finish.
    let drain = Duration::from_secs(config.shutdown_timeout_secs);
    if tokio::time::timeout(drain, orchestrator.shutdown()).await.is_err() {
        tracing::warn!(
            timeout_secs = config.shutdown_timeout_secs,
            "In-flight resolutions did not finish in time, their jobs stay pending",
        );
    }

    let observers = hub.observer_count().await;
    tracing::info!(observers, "Closing remaining WebSocket observers");
    hub.close_all().await;

    tracing::info!("Graceful shutdown complete");
    Ok(())
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix) so the server
/// shuts down cleanly whether stopped interactively or by a process
/// manager.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl-C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
