//! Image bucket on S3-compatible storage

use aws_sdk_s3::Client as S3Client;
use axum::async_trait;

use crate::config::ImageStorageConfig;
use crate::error::AppError;
use crate::storage::build_s3_http_client;

/// Destination for processed images
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ImageStore: Send + Sync {
    /// Store `data` under `key` and return its public URL
    async fn put(&self, key: &str, data: Vec<u8>, content_type: &str) -> Result<String, AppError>;
}

/// Image store backed by an S3 bucket
///
/// Objects are written with `Content-Disposition: attachment` and
/// server-side AES-256 encryption.
pub struct S3ImageStore {
    client: S3Client,
    config: ImageStorageConfig,
}

impl S3ImageStore {
    /// Create the S3 client. No request is made until the first upload.
    pub fn new(config: &ImageStorageConfig) -> Self {
        use aws_sdk_s3::config::BehaviorVersion;
        use aws_sdk_s3::config::{Credentials, Region};

        let credentials = Credentials::new(
            &config.access_key_id,
            &config.secret_access_key,
            None,
            None,
            "foliopage-images",
        );

        let mut builder = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .http_client(build_s3_http_client())
            .region(Region::new(config.region.clone()))
            .credentials_provider(credentials);
        if let Some(endpoint) = config.endpoint_url.as_deref() {
            builder = builder.endpoint_url(endpoint);
        }

        Self {
            client: S3Client::from_conf(builder.build()),
            config: config.clone(),
        }
    }
}

#[async_trait]
impl ImageStore for S3ImageStore {
    async fn put(&self, key: &str, data: Vec<u8>, content_type: &str) -> Result<String, AppError> {
        use aws_sdk_s3::primitives::ByteStream;
        use aws_sdk_s3::types::ServerSideEncryption;

        let size = data.len();
        self.client
            .put_object()
            .bucket(&self.config.bucket)
            .key(key)
            .body(ByteStream::from(data))
            .content_type(content_type)
            .content_disposition("attachment")
            .server_side_encryption(ServerSideEncryption::Aes256)
            .send()
            .await
            .map_err(|e| AppError::Storage(format!("S3 upload failed: {}", e)))?;

        tracing::debug!(bucket = %self.config.bucket, key, size, "Image stored");
        Ok(self.config.object_url(key))
    }
}
