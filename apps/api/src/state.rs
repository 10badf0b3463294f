use std::sync::Arc;

use crate::blob::BlobStore;
use crate::store::ResumeStore;
use crate::upload::UploadPipeline;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub store: ResumeStore,
    pub blobs: Arc<dyn BlobStore>,
    pub pipeline: UploadPipeline,
    /// Bearer token uploads must present.
    pub api_token: Arc<str>,
}
