// Upload Pipeline: file upload → preview render → record creation → feedback request.
// All analysis goes through the `FeedbackAnalyzer` seam; no direct LLM calls here.

pub mod handlers;
pub mod pipeline;

pub use self::pipeline::{UploadError, UploadPipeline, UploadRequest};
