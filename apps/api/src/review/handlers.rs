//! Axum route handlers for reading résumé records.

use axum::{
    extract::{Path, State},
    http::header,
    response::IntoResponse,
    Json,
};
use serde::Serialize;

use super::inspect;
use super::reconciler::{adopt, Fetch, CORRUPTED_MESSAGE, UNAVAILABLE_MESSAGE};
use crate::errors::AppError;
use crate::models::feedback::Feedback;
use crate::models::resume::{ResumeRecord, ResumeStatus};
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewResponse {
    pub id: String,
    pub status: ResumeStatus,
    pub error_message: Option<String>,
    pub feedback: Option<Feedback>,
    pub company_name: Option<String>,
    pub job_title: Option<String>,
}

impl ReviewResponse {
    fn from_record(record: ResumeRecord) -> Self {
        let state = adopt(&record);
        Self {
            status: state.status(),
            error_message: state.message().map(String::from),
            feedback: state.feedback().cloned(),
            id: record.id,
            company_name: record.company_name,
            job_title: record.job_title,
        }
    }
}

/// GET /api/v1/resumes
///
/// Every stored record (the home listing), newest first.
pub async fn handle_list_resumes(
    State(state): State<AppState>,
) -> Result<Json<Vec<ResumeRecord>>, AppError> {
    Ok(Json(state.store.list_records().await?))
}

/// GET /api/v1/resumes/:id
///
/// One read of the record with the same decode/adopt rules as the review screen.
pub async fn handle_get_resume(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ReviewResponse>, AppError> {
    match inspect(&state.store, &id).await {
        Fetch::Corrupted(e) => {
            tracing::warn!("Record {id} is corrupted: {e}");
            Err(AppError::UnprocessableEntity(CORRUPTED_MESSAGE.to_string()))
        }
        fetch => Ok(Json(ReviewResponse::from_record(expect_record(fetch, &id)?))),
    }
}

/// GET /api/v1/resumes/:id/file
pub async fn handle_get_file(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let record = load_record(&state, &id).await?;
    blob_response(&state, &record.resume_path, "application/pdf").await
}

/// GET /api/v1/resumes/:id/preview
pub async fn handle_get_preview(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let record = load_record(&state, &id).await?;
    blob_response(&state, &record.image_path, "image/png").await
}

async fn load_record(state: &AppState, id: &str) -> Result<ResumeRecord, AppError> {
    expect_record(inspect(&state.store, id).await, id)
}

fn expect_record(fetch: Fetch, id: &str) -> Result<ResumeRecord, AppError> {
    match fetch {
        Fetch::Record(record) => Ok(record),
        Fetch::Missing => Err(AppError::NotFound(format!("Resume {id} not found"))),
        Fetch::Corrupted(_) => Err(AppError::UnprocessableEntity(CORRUPTED_MESSAGE.to_string())),
        Fetch::Unavailable(e) => {
            tracing::error!("Failed to read record {id}: {e}");
            Err(AppError::Upstream(UNAVAILABLE_MESSAGE.to_string()))
        }
    }
}

async fn blob_response(
    state: &AppState,
    path: &str,
    content_type: &'static str,
) -> Result<impl IntoResponse, AppError> {
    if path.is_empty() {
        return Err(AppError::NotFound("No file stored for this resume".to_string()));
    }
    let bytes = state
        .blobs
        .read(path)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("File {path} not found")))?;
    Ok(([(header::CONTENT_TYPE, content_type)], bytes))
}
