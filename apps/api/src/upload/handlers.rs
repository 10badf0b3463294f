//! Axum route handler for résumé uploads.

use axum::{
    extract::{Multipart, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::Serialize;
use tracing::debug;

use crate::blob::UploadFile;
use crate::errors::AppError;
use crate::models::resume::{JobDetails, ResumeStatus};
use crate::session::SessionStatus;
use crate::state::AppState;
use crate::upload::{UploadError, UploadRequest};

/// Largest accepted upload form, file included.
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub id: String,
    pub status: ResumeStatus,
    pub error_message: Option<String>,
    /// Where the client should go to review the result.
    pub review_path: String,
}

/// POST /api/v1/resumes
///
/// Multipart form: `companyName`, `jobTitle`, `jobDescription`, `file` (PDF).
/// Returns 201 once a record exists, whatever state the analysis reached.
pub async fn handle_upload(
    State(state): State<AppState>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<(StatusCode, Json<UploadResponse>), AppError> {
    let session = SessionStatus::from_headers(&headers, &state.api_token);
    if !session.can_upload() {
        return Err(UploadError::NotSignedIn.into());
    }

    let request = read_upload_form(multipart).await?;
    let outcome = state.pipeline.run(request, session).await?;

    Ok((
        StatusCode::CREATED,
        Json(UploadResponse {
            review_path: outcome.review_path(),
            id: outcome.id,
            status: outcome.status,
            error_message: outcome.error_message,
        }),
    ))
}

async fn read_upload_form(mut multipart: Multipart) -> Result<UploadRequest, AppError> {
    let mut job = JobDetails::default();
    let mut file = None;

    while let Some(field) = multipart.next_field().await.map_err(form_error)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "companyName" => job.company_name = non_blank(field.text().await.map_err(form_error)?),
            "jobTitle" => job.job_title = non_blank(field.text().await.map_err(form_error)?),
            "jobDescription" => {
                job.job_description = non_blank(field.text().await.map_err(form_error)?)
            }
            "file" => {
                let file_name = field.file_name().unwrap_or("resume.pdf").to_string();
                let content_type = field
                    .content_type()
                    .unwrap_or("application/pdf")
                    .to_string();
                let bytes = field.bytes().await.map_err(form_error)?;
                if !bytes.is_empty() {
                    file = Some(UploadFile {
                        name: file_name,
                        content_type,
                        bytes,
                    });
                }
            }
            other => debug!("Ignoring unknown form field '{other}'"),
        }
    }

    Ok(UploadRequest { job, file })
}

fn form_error(e: axum::extract::multipart::MultipartError) -> AppError {
    AppError::Validation(format!("Invalid upload form: {e}"))
}

fn non_blank(value: String) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
