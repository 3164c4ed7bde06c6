#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use jobsim_core::job::{ExecutionRange, Job};
use jobsim_db::JobStore;
use jobsim_events::NotificationHub;
use jobsim_pipeline::{JobOrchestrator, ResolveError, Resolver};
use tower::ServiceExt;

use jobsim_api::config::ServerConfig;
use jobsim_api::router::build_app_router;
use jobsim_api::state::AppState;

pub const IMAGE_URL: &str = "https://images.example/food-small.jpg";

/// Resolves every job to [`IMAGE_URL`].
pub struct StaticResolver;

#[async_trait]
impl Resolver for StaticResolver {
    async fn resolve(&self, _job: &Job) -> Result<String, ResolveError> {
        Ok(IMAGE_URL.to_string())
    }
}

/// Build a test `ServerConfig` with safe defaults.
///
/// Uses `http://localhost:5173` as CORS origin (matching the dev default)
/// and a 30-second request timeout.
pub fn test_config(dir: &tempfile::TempDir) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 30,
        job_store_path: dir.path().join("jobList.json"),
        unsplash: jobsim_unsplash::UnsplashConfig::new("test-access-key"),
    }
}

/// A fully wired app over a temp-dir store.
///
/// Holds the temp dir so the store file outlives the test body.
pub struct TestApp {
    pub dir: tempfile::TempDir,
    pub state: AppState,
    pub router: Router,
}

/// Build the full application router with all middleware layers.
///
/// Jobs take `execution_secs` to become due and resolve through
/// [`StaticResolver`].
pub async fn build_test_app(execution_secs: u64) -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&dir);

    let store = Arc::new(JobStore::open(&config.job_store_path).await.unwrap());
    let hub = Arc::new(NotificationHub::new());
    let orchestrator = JobOrchestrator::start(
        store,
        Arc::clone(&hub),
        Arc::new(StaticResolver),
        ExecutionRange::fixed(execution_secs),
    )
    .await;

    let state = AppState {
        config: Arc::new(config.clone()),
        orchestrator,
        hub,
    };
    let router = build_app_router(state.clone(), &config).unwrap();

    TestApp { dir, state, router }
}

/// Serve `app` on an ephemeral port and return its address.
pub async fn serve(app: &TestApp) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let router = app.router.clone();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    send(app, Method::GET, uri).await
}

pub async fn post(app: Router, uri: &str) -> Response<Body> {
    send(app, Method::POST, uri).await
}

async fn send(app: Router, method: Method, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
