//! Integration tests for `UnsplashClient` against a local mock API.
//!
//! A throw-away axum server plays Unsplash: it answers
//! `GET /photos/random` from a scripted list of responses and counts hits,
//! so the retry bound and error classification are verified over real HTTP.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::routing::get;
use axum::Router;
use jobsim_unsplash::{RetryPolicy, UnsplashApiError, UnsplashClient, UnsplashConfig};

const PHOTO_BODY: &str =
    r#"{"id":"p1","urls":{"small":"https://images.example/p1-small.jpg","regular":"https://images.example/p1.jpg"}}"#;

#[derive(Clone)]
struct MockApi {
    hits: Arc<AtomicU32>,
    /// Response for hit `n` is `script[min(n, len - 1)]`.
    script: Arc<Vec<(StatusCode, &'static str)>>,
    last_request: Arc<Mutex<Option<(HashMap<String, String>, Option<String>)>>>,
}

async fn random_photo(
    State(mock): State<MockApi>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> (StatusCode, [(header::HeaderName, &'static str); 1], &'static str) {
    let hit = mock.hits.fetch_add(1, Ordering::SeqCst) as usize;
    let auth = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    *mock.last_request.lock().unwrap() = Some((params, auth));

    let (status, body) = mock.script[hit.min(mock.script.len() - 1)];
    (status, [(header::CONTENT_TYPE, "application/json")], body)
}

/// Start the mock and return its base URL plus the shared state.
async fn spawn_mock(script: Vec<(StatusCode, &'static str)>) -> (String, MockApi) {
    let mock = MockApi {
        hits: Arc::new(AtomicU32::new(0)),
        script: Arc::new(script),
        last_request: Arc::new(Mutex::new(None)),
    };
    let app = Router::new()
        .route("/photos/random", get(random_photo))
        .with_state(mock.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{addr}"), mock)
}

fn client_for(base_url: String) -> UnsplashClient {
    UnsplashClient::new(UnsplashConfig {
        api_url: base_url,
        ..UnsplashConfig::new("test-access-key")
    })
    .with_policy(RetryPolicy {
        initial_delay: Duration::from_millis(5),
        max_delay: Duration::from_millis(20),
        ..Default::default()
    })
}

// ---------------------------------------------------------------------------
// Test: success returns the small rendition URL after one hit
// ---------------------------------------------------------------------------

#[tokio::test]
async fn success_returns_small_url() {
    let (url, mock) = spawn_mock(vec![(StatusCode::OK, PHOTO_BODY)]).await;

    let image = client_for(url).fetch_image_url().await.unwrap();

    assert_eq!(image, "https://images.example/p1-small.jpg");
    assert_eq!(mock.hits.load(Ordering::SeqCst), 1);
}

// ---------------------------------------------------------------------------
// Test: request carries query, orientation and credential
// ---------------------------------------------------------------------------

#[tokio::test]
async fn request_carries_query_and_credential() {
    let (url, mock) = spawn_mock(vec![(StatusCode::OK, PHOTO_BODY)]).await;

    client_for(url).fetch_image_url().await.unwrap();

    let (params, auth) = mock.last_request.lock().unwrap().clone().unwrap();
    assert_eq!(params.get("query").map(String::as_str), Some("food"));
    assert_eq!(params.get("orientation").map(String::as_str), Some("landscape"));
    assert_eq!(auth.as_deref(), Some("Client-ID test-access-key"));
}

// ---------------------------------------------------------------------------
// Test: server fault every time -> exactly 3 attempts, then failure
// ---------------------------------------------------------------------------

#[tokio::test]
async fn server_fault_is_retried_exactly_three_times() {
    let (url, mock) = spawn_mock(vec![(StatusCode::INTERNAL_SERVER_ERROR, "{}")]).await;

    let err = client_for(url).fetch_image_url().await.unwrap_err();

    assert!(matches!(err, UnsplashApiError::ApiError { status: 500, .. }));
    assert_eq!(mock.hits.load(Ordering::SeqCst), 3);
}

// ---------------------------------------------------------------------------
// Test: transient fault followed by success recovers
// ---------------------------------------------------------------------------

#[tokio::test]
async fn recovers_after_one_server_fault() {
    let (url, mock) = spawn_mock(vec![
        (StatusCode::INTERNAL_SERVER_ERROR, "{}"),
        (StatusCode::OK, PHOTO_BODY),
    ])
    .await;

    let image = client_for(url).fetch_image_url().await.unwrap();

    assert_eq!(image, "https://images.example/p1-small.jpg");
    assert_eq!(mock.hits.load(Ordering::SeqCst), 2);
}

// ---------------------------------------------------------------------------
// Test: other statuses are terminal on the first attempt
// ---------------------------------------------------------------------------

#[tokio::test]
async fn non_transient_status_is_not_retried() {
    for status in [StatusCode::UNAUTHORIZED, StatusCode::SERVICE_UNAVAILABLE] {
        let (url, mock) = spawn_mock(vec![(status, r#"{"errors":["nope"]}"#)]).await;

        let err = client_for(url).fetch_image_url().await.unwrap_err();

        assert!(
            matches!(err, UnsplashApiError::ApiError { status: s, .. } if s == status.as_u16()),
            "unexpected error for {status}: {err}"
        );
        assert_eq!(mock.hits.load(Ordering::SeqCst), 1);
    }
}

// ---------------------------------------------------------------------------
// Test: a photo without a small URL is a terminal failure
// ---------------------------------------------------------------------------

#[tokio::test]
async fn missing_small_url_is_terminal() {
    let (url, mock) = spawn_mock(vec![(StatusCode::OK, r#"{"id":"p2","urls":{}}"#)]).await;

    let err = client_for(url).fetch_image_url().await.unwrap_err();

    assert!(matches!(err, UnsplashApiError::MissingArtifact));
    assert_eq!(mock.hits.load(Ordering::SeqCst), 1);
}

// ---------------------------------------------------------------------------
// Test: malformed body is a terminal decode failure
// ---------------------------------------------------------------------------

#[tokio::test]
async fn malformed_body_is_terminal() {
    let (url, mock) = spawn_mock(vec![(StatusCode::OK, "not json")]).await;

    let err = client_for(url).fetch_image_url().await.unwrap_err();

    assert!(matches!(err, UnsplashApiError::Decode(_)));
    assert_eq!(mock.hits.load(Ordering::SeqCst), 1);
}

// ---------------------------------------------------------------------------
// Test: unreachable host is a terminal transport failure
// ---------------------------------------------------------------------------

#[tokio::test]
async fn connection_refused_is_not_retried() {
    // Bind then drop to get a port nothing listens on.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = client_for(format!("http://{addr}"))
        .fetch_image_url()
        .await
        .unwrap_err();

    assert!(matches!(err, UnsplashApiError::Request(_)));
}
