//! Integration tests for the `/api/v1/jobs` endpoints.

mod common;

use std::time::Duration;

use axum::http::StatusCode;
use common::{body_json, get, post, IMAGE_URL};
use jobsim_db::JobStore;

// ---------------------------------------------------------------------------
// Test: POST /jobs returns 201 with the new id, immediately
// ---------------------------------------------------------------------------

#[tokio::test]
async fn create_job_returns_201_with_id() {
    let app = common::build_test_app(300).await;

    let response = tokio::time::timeout(
        Duration::from_secs(2),
        post(app.router.clone(), "/api/v1/jobs"),
    )
    .await
    .expect("creation must not wait for resolution");

    assert_eq!(response.status(), StatusCode::CREATED);
    let json = body_json(response).await;
    let id: uuid::Uuid = json["data"]["id"].as_str().unwrap().parse().unwrap();

    let job = app.state.orchestrator.get_job(id).await.unwrap();
    assert_eq!(job.status, jobsim_core::job::JobStatus::Pending);
}

// ---------------------------------------------------------------------------
// Test: GET /jobs lists jobs in creation order with the wire shape
// ---------------------------------------------------------------------------

#[tokio::test]
async fn list_jobs_returns_created_jobs_in_order() {
    let app = common::build_test_app(300).await;

    let first = body_json(post(app.router.clone(), "/api/v1/jobs").await).await;
    let second = body_json(post(app.router.clone(), "/api/v1/jobs").await).await;

    let response = get(app.router.clone(), "/api/v1/jobs").await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    let jobs = json["data"].as_array().unwrap();
    assert_eq!(jobs.len(), 2);
    assert_eq!(jobs[0]["id"], first["data"]["id"]);
    assert_eq!(jobs[1]["id"], second["data"]["id"]);

    let job = &jobs[0];
    assert_eq!(job["status"], "pending");
    assert!(job["result"].is_null());
    assert_eq!(job["executionDuration"], 300);
    assert!(job["startedAt"].is_string());
}

// ---------------------------------------------------------------------------
// Test: GET /jobs on an empty store returns an empty list
// ---------------------------------------------------------------------------

#[tokio::test]
async fn list_jobs_on_empty_store_is_empty() {
    let app = common::build_test_app(300).await;

    let json = body_json(get(app.router.clone(), "/api/v1/jobs").await).await;

    assert_eq!(json["data"], serde_json::json!([]));
}

// ---------------------------------------------------------------------------
// Test: GET /jobs/{id} returns 404 NOT_FOUND for an unknown id
// ---------------------------------------------------------------------------

#[tokio::test]
async fn get_unknown_job_returns_404() {
    let app = common::build_test_app(300).await;
    let id = uuid::Uuid::new_v4();

    let response = get(app.router.clone(), &format!("/api/v1/jobs/{id}")).await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = body_json(response).await;
    assert_eq!(json["code"], "NOT_FOUND");
}

// ---------------------------------------------------------------------------
// Test: GET /jobs/{id} with a malformed id is a client error
// ---------------------------------------------------------------------------

#[tokio::test]
async fn get_job_with_malformed_id_is_rejected() {
    let app = common::build_test_app(300).await;

    let response = get(app.router.clone(), "/api/v1/jobs/not-a-uuid").await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// ---------------------------------------------------------------------------
// Test: a due job is resolved and visible through GET /jobs/{id}
// ---------------------------------------------------------------------------

#[tokio::test]
async fn due_job_is_resolved_and_persisted() {
    let app = common::build_test_app(0).await;

    let created = body_json(post(app.router.clone(), "/api/v1/jobs").await).await;
    let id = created["data"]["id"].as_str().unwrap().to_string();

    let mut job = serde_json::Value::Null;
    for _ in 0..50 {
        job = body_json(get(app.router.clone(), &format!("/api/v1/jobs/{id}")).await).await;
        if job["data"]["status"] != "pending" {
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    assert_eq!(job["data"]["status"], "resolved");
    assert_eq!(job["data"]["result"], IMAGE_URL);

    let reopened = JobStore::open(app.dir.path().join("jobList.json")).await.unwrap();
    let stored = reopened.get_by_id(id.parse().unwrap()).await.unwrap();
    assert_eq!(stored.result.as_deref(), Some(IMAGE_URL));
}
