//! Blob storage for uploaded résumés and their rendered previews.

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

pub mod s3;

pub use self::s3::S3BlobStore;

#[derive(Debug, Error)]
pub enum BlobError {
    #[error("upload of {path} failed: {message}")]
    Upload { path: String, message: String },

    #[error("read of {path} failed: {message}")]
    Read { path: String, message: String },
}

/// A file handed to the blob store.
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

/// Location of an uploaded blob.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredBlob {
    pub path: String,
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn upload(&self, file: UploadFile) -> Result<StoredBlob, BlobError>;
    /// `None` when nothing is stored at `path`.
    async fn read(&self, path: &str) -> Result<Option<Bytes>, BlobError>;
}

/// Storage path for a new upload: `uploads/<uuid>/<sanitized file name>`.
pub fn upload_path(file_name: &str) -> String {
    let name: String = file_name
        .rsplit(|c: char| c == '/' || c == '\\')
        .next()
        .unwrap_or_default()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let name = if name.is_empty() { "file".to_string() } else { name };
    format!("uploads/{}/{}", Uuid::new_v4(), name)
}

/// In-process blob store for tests and local runs.
#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: RwLock<HashMap<String, Bytes>>,
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn upload(&self, file: UploadFile) -> Result<StoredBlob, BlobError> {
        let path = upload_path(&file.name);
        self.blobs.write().await.insert(path.clone(), file.bytes);
        Ok(StoredBlob { path })
    }

    async fn read(&self, path: &str) -> Result<Option<Bytes>, BlobError> {
        Ok(self.blobs.read().await.get(path).cloned())
    }
}
