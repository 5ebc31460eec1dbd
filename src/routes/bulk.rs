use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use uuid::Uuid;

use super::error::ApiError;
use super::extract::AuthUser;
use crate::app_state::BulkApi;
use crate::models::bulk::{BulkGenerationRequest, JobStatusResponse, SubmitResponse};

pub fn router() -> Router<BulkApi> {
    Router::new()
        .route("/api/v1/bulk-generation", post(submit_bulk_generation))
        .route("/api/v1/bulk-generation/status", get(get_bulk_generation_status))
}

/// POST /api/v1/bulk-generation - Create a job generating one course per employee.
#[tracing::instrument(skip_all, fields(user_id = %user.user_id))]
pub async fn submit_bulk_generation(
    State(api): State<BulkApi>,
    user: AuthUser,
    payload: Result<Json<BulkGenerationRequest>, JsonRejection>,
) -> Result<Json<SubmitResponse>, ApiError> {
    let Json(request) = payload
        .map_err(|e| ApiError::bad_request("Invalid request body", Some(e.body_text())))?;

    let receipt = api.submissions.submit(request, user.user_id).await?;

    Ok(Json(SubmitResponse {
        success: true,
        job_id: receipt.job_id,
        total_employees: receipt.total_employees,
        estimated_time_minutes: receipt.estimated_time_minutes,
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusQuery {
    pub job_id: Option<String>,
}

/// GET /api/v1/bulk-generation/status?jobId= - Job progress for its creator.
#[tracing::instrument(skip_all, fields(user_id = %user.user_id))]
pub async fn get_bulk_generation_status(
    State(api): State<BulkApi>,
    user: AuthUser,
    Query(query): Query<StatusQuery>,
) -> Result<Json<JobStatusResponse>, ApiError> {
    let raw = query
        .job_id
        .ok_or_else(|| ApiError::bad_request("Missing jobId", None))?;
    let job_id = Uuid::parse_str(raw.trim())
        .map_err(|_| ApiError::bad_request(format!("Invalid job ID: {}", raw), None))?;

    // Jobs owned by someone else are reported exactly like missing ones.
    let report = api
        .status
        .job_status(job_id, user.user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Job not found".to_string()))?;

    Ok(Json(JobStatusResponse {
        success: true,
        report,
    }))
}
