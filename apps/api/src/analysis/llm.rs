use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

use super::prompts::FEEDBACK_SYSTEM;
use super::{AnalysisError, AnalysisRequest, AnalysisResponse, FeedbackAnalyzer};
use crate::blob::BlobStore;
use crate::llm_client::prompts::JSON_ONLY_SYSTEM;
use crate::llm_client::LlmClient;

/// Synchronous analysis: extracts the PDF text and asks the LLM for feedback.
pub struct LlmAnalyzer {
    llm: LlmClient,
    blobs: Arc<dyn BlobStore>,
}

impl LlmAnalyzer {
    pub fn new(llm: LlmClient, blobs: Arc<dyn BlobStore>) -> Self {
        Self { llm, blobs }
    }
}

#[async_trait]
impl FeedbackAnalyzer for LlmAnalyzer {
    async fn feedback(
        &self,
        request: &AnalysisRequest,
    ) -> Result<Option<AnalysisResponse>, AnalysisError> {
        let pdf = self
            .blobs
            .read(&request.file_path)
            .await?
            .ok_or_else(|| AnalysisError::MissingFile(request.file_path.clone()))?;

        // pdf-extract is CPU-bound and synchronous
        let resume_text =
            tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&pdf))
                .await
                .map_err(|e| AnalysisError::Extract(e.to_string()))?
                .map_err(|e| AnalysisError::Extract(e.to_string()))?;

        let prompt = format!(
            "{}\n\nRésumé text:\n{}",
            request.instructions,
            resume_text.trim()
        );
        let system = format!("{JSON_ONLY_SYSTEM} {FEEDBACK_SYSTEM}");
        let response = self.llm.call(&prompt, &system).await?;

        info!("Analysis completed for record {}", request.record_id);
        Ok(Some(AnalysisResponse::from_blocks(response.text_blocks())))
    }
}
