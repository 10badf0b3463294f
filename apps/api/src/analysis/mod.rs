//! Analysis service — turns an uploaded résumé plus job context into scored feedback.
//!
//! Two backends share one trait:
//! - `LlmAnalyzer` answers synchronously through the LLM client.
//! - `QueuedAnalyzer` hands the job to the out-of-band worker and answers `None`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::blob::BlobError;
use crate::llm_client::LlmError;
use crate::models::feedback::Feedback;
use crate::models::resume::{RecordError, ResumeRecord};

pub mod llm;
pub mod prompts;
pub mod queue;
pub mod worker;

pub use self::llm::LlmAnalyzer;
pub use self::queue::{AnalysisQueue, QueuedAnalyzer};

/// Shown when the analysis text is empty or missing.
pub const UNEXPECTED_FORMAT: &str = "Feedback returned in an unexpected format.";

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("Blob error: {0}")]
    Blob(#[from] BlobError),

    #[error("Uploaded file {0} is missing")]
    MissingFile(String),

    #[error("Could not read text from the PDF: {0}")]
    Extract(String),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Queue error: {0}")]
    Queue(#[from] redis::RedisError),

    #[error("Failed to encode job: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Everything the analysis collaborator needs for one résumé.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRequest {
    /// Record the result belongs to. Only the queued backend needs it.
    pub record_id: String,
    pub file_path: String,
    pub instructions: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResponse {
    pub message: AnalysisMessage,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisMessage {
    pub content: MessageContent,
}

/// The analysis text arrives either bare or wrapped in content blocks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Blocks(Vec<TextBlock>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextBlock {
    pub text: String,
}

impl MessageContent {
    /// Canonical text payload: the string itself, or the first block's text.
    pub fn into_text(self) -> Option<String> {
        match self {
            MessageContent::Text(text) => Some(text),
            MessageContent::Blocks(blocks) => blocks.into_iter().next().map(|b| b.text),
        }
    }
}

impl AnalysisResponse {
    pub fn from_blocks(texts: Vec<String>) -> Self {
        Self {
            message: AnalysisMessage {
                content: MessageContent::Blocks(
                    texts.into_iter().map(|text| TextBlock { text }).collect(),
                ),
            },
        }
    }

    /// Extracts and parses the feedback payload. The error is the user-facing message
    /// persisted into the record.
    pub fn into_feedback(self) -> Result<Feedback, String> {
        let text = self
            .message
            .content
            .into_text()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| UNEXPECTED_FORMAT.to_string())?;
        Feedback::parse(&text).map_err(|e| e.to_string())
    }
}

/// Moves a processing record to its terminal state: `success` with parsed feedback, or
/// `error` carrying the parse failure.
pub fn apply_response(
    record: &mut ResumeRecord,
    response: AnalysisResponse,
) -> Result<(), RecordError> {
    match response.into_feedback() {
        Ok(feedback) => record.mark_success(feedback),
        Err(message) => record.mark_error(message),
    }
}

#[async_trait]
pub trait FeedbackAnalyzer: Send + Sync {
    /// `Ok(None)` means the job was queued and the result will be written out-of-band.
    async fn feedback(
        &self,
        request: &AnalysisRequest,
    ) -> Result<Option<AnalysisResponse>, AnalysisError>;
}
