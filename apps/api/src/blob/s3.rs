use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use bytes::Bytes;
use tracing::info;

use super::{upload_path, BlobError, BlobStore, StoredBlob, UploadFile};

/// Blob store on S3 or MinIO.
#[derive(Clone)]
pub struct S3BlobStore {
    client: aws_sdk_s3::Client,
    bucket: String,
}

impl S3BlobStore {
    pub fn new(client: aws_sdk_s3::Client, bucket: String) -> Self {
        Self { client, bucket }
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn upload(&self, file: UploadFile) -> Result<StoredBlob, BlobError> {
        let path = upload_path(&file.name);
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&path)
            .body(ByteStream::from(file.bytes))
            .content_type(&file.content_type)
            .send()
            .await
            .map_err(|e| BlobError::Upload {
                path: path.clone(),
                message: e.to_string(),
            })?;

        info!("Uploaded s3://{}/{}", self.bucket, path);
        Ok(StoredBlob { path })
    }

    async fn read(&self, path: &str) -> Result<Option<Bytes>, BlobError> {
        let output = match self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(path)
            .send()
            .await
        {
            Ok(output) => output,
            Err(e) => {
                if e.as_service_error().is_some_and(|se| se.is_no_such_key()) {
                    return Ok(None);
                }
                return Err(BlobError::Read {
                    path: path.to_string(),
                    message: e.to_string(),
                });
            }
        };

        let data = output.body.collect().await.map_err(|e| BlobError::Read {
            path: path.to_string(),
            message: e.to_string(),
        })?;
        Ok(Some(data.into_bytes()))
    }
}
