//! Handlers for the `/jobs` resource.
//!
//! Creation returns as soon as the job is persisted; the outcome arrives
//! later over the WebSocket.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use jobsim_core::error::CoreError;
use jobsim_core::types::JobId;
use serde::Serialize;

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

/// Body of a successful `POST /jobs`.
#[derive(Debug, Serialize)]
pub struct CreatedJob {
    pub id: JobId,
}

/// POST /api/v1/jobs
///
/// Create a pending job. Returns 201 with its id.
pub async fn create_job(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let job = state.orchestrator.create_job().await?;
    Ok((
        StatusCode::CREATED,
        Json(DataResponse {
            data: CreatedJob { id: job.id },
        }),
    ))
}

/// GET /api/v1/jobs
pub async fn list_jobs(State(state): State<AppState>) -> impl IntoResponse {
    let jobs = state.orchestrator.list_jobs().await;
    Json(DataResponse { data: jobs })
}

/// GET /api/v1/jobs/{id}
pub async fn get_job(
    State(state): State<AppState>,
    Path(id): Path<JobId>,
) -> AppResult<impl IntoResponse> {
    let job = state
        .orchestrator
        .get_job(id)
        .await
        .ok_or(AppError::Core(CoreError::NotFound { entity: "Job", id }))?;
    Ok(Json(DataResponse { data: job }))
}
