//! Orchestrates one résumé upload end to end.
//!
//! Steps before the record exists fail fast with `UploadError` and leave nothing behind.
//! Once the `processing` record is written, every failure is converted into a persisted
//! `error` record so a review session never polls forever against a missing key.

use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::analysis::prompts::prepare_instructions;
use crate::analysis::{apply_response, AnalysisRequest, FeedbackAnalyzer};
use crate::blob::{BlobError, BlobStore, UploadFile};
use crate::convert::{looks_like_pdf, ConvertError, PreviewRenderer};
use crate::models::resume::{JobDetails, ResumeRecord, ResumeStatus};
use crate::session::SessionStatus;
use crate::store::ResumeStore;

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("Please sign in before uploading.")]
    NotSignedIn,

    #[error("Please select a PDF to analyze.")]
    MissingFile,

    #[error("Only PDF résumés are supported.")]
    NotPdf,

    #[error("Failed to upload file: {0}")]
    FileUpload(BlobError),

    #[error("Failed to convert PDF to image: {0}")]
    Conversion(ConvertError),

    #[error("Failed to upload image: {0}")]
    ImageUpload(BlobError),
}

#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub job: JobDetails,
    pub file: Option<UploadFile>,
}

/// Where the upload ended up. `status` is `processing` when analysis was queued.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadOutcome {
    pub id: String,
    pub status: ResumeStatus,
    pub error_message: Option<String>,
}

impl UploadOutcome {
    /// Navigation target for the review view.
    pub fn review_path(&self) -> String {
        format!("/resume/{}", self.id)
    }
}

#[derive(Clone)]
pub struct UploadPipeline {
    store: ResumeStore,
    blobs: Arc<dyn BlobStore>,
    renderer: Arc<dyn PreviewRenderer>,
    analyzer: Arc<dyn FeedbackAnalyzer>,
}

impl UploadPipeline {
    pub fn new(
        store: ResumeStore,
        blobs: Arc<dyn BlobStore>,
        renderer: Arc<dyn PreviewRenderer>,
        analyzer: Arc<dyn FeedbackAnalyzer>,
    ) -> Self {
        Self {
            store,
            blobs,
            renderer,
            analyzer,
        }
    }

    pub async fn run(
        &self,
        request: UploadRequest,
        session: SessionStatus,
    ) -> Result<UploadOutcome, UploadError> {
        if !session.can_upload() {
            return Err(UploadError::NotSignedIn);
        }
        let file = request.file.ok_or(UploadError::MissingFile)?;
        if !looks_like_pdf(&file.bytes) {
            return Err(UploadError::NotPdf);
        }

        info!("Uploading the file...");
        let pdf = file.bytes.clone();
        let preview_name = preview_file_name(&file.name);
        let stored_file = self
            .blobs
            .upload(file)
            .await
            .map_err(UploadError::FileUpload)?;

        info!("Converting to image...");
        let png = self
            .renderer
            .render(&pdf)
            .await
            .map_err(UploadError::Conversion)?;

        info!("Uploading the image...");
        let stored_image = self
            .blobs
            .upload(UploadFile {
                name: preview_name,
                content_type: "image/png".to_string(),
                bytes: png,
            })
            .await
            .map_err(UploadError::ImageUpload)?;

        info!("Preparing data...");
        let id = Uuid::new_v4().to_string();
        let record = ResumeRecord::new(
            id.clone(),
            &request.job,
            stored_file.path,
            stored_image.path,
        );

        match self.analyze(record.clone()).await {
            Ok(settled) => Ok(UploadOutcome {
                id,
                status: settled.status,
                error_message: settled.error_message,
            }),
            Err(message) => {
                error!("Analysis of {id} failed: {message}");
                self.persist_failure(record, &message).await;
                Ok(UploadOutcome {
                    id,
                    status: ResumeStatus::Error,
                    error_message: Some(message),
                })
            }
        }
    }

    /// Steps after the record id exists. Any `Err` is a user-facing message still to be
    /// persisted by the caller.
    async fn analyze(&self, mut record: ResumeRecord) -> Result<ResumeRecord, String> {
        self.store
            .put(&record)
            .await
            .map_err(|e| format!("Failed to save résumé record: {e}"))?;

        info!("Analyzing...");
        let request = AnalysisRequest {
            record_id: record.id.clone(),
            file_path: record.resume_path.clone(),
            instructions: prepare_instructions(
                record.job_title.as_deref(),
                record.job_description.as_deref(),
            ),
        };
        let Some(response) = self
            .analyzer
            .feedback(&request)
            .await
            .map_err(|e| e.to_string())?
        else {
            info!("Analysis queued for {}", record.id);
            return Ok(record);
        };

        apply_response(&mut record, response).map_err(|e| e.to_string())?;
        if let Some(message) = &record.error_message {
            warn!("Feedback for {} was malformed: {message}", record.id);
        }
        self.store
            .put(&record)
            .await
            .map_err(|e| format!("Failed to save analysis result: {e}"))?;

        info!("Analysis complete for {}", record.id);
        Ok(record)
    }

    /// Best effort: one attempt to leave a terminal `error` record behind.
    async fn persist_failure(&self, mut record: ResumeRecord, message: &str) {
        if let Err(e) = record.mark_error(message) {
            warn!("Not persisting failure: {e}");
            return;
        }
        if let Err(e) = self.store.put(&record).await {
            error!("Failed to persist error record {}: {e}", record.id);
        }
    }
}

/// `cv.pdf` → `cv.png`.
fn preview_file_name(file_name: &str) -> String {
    let stem = file_name
        .rsplit_once('.')
        .map(|(stem, _)| stem)
        .unwrap_or(file_name);
    format!("{stem}.png")
}
