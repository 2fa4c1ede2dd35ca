use super::{ArtifactStore, StorageError};
use async_trait::async_trait;
use aws_sdk_s3::config::Builder;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::{Client, config::BehaviorVersion, config::Credentials, config::Region};
use std::path::Path;
use tokio::io::AsyncWriteExt;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Clone)]
pub struct StorageService {
    pub client: Client,
    pub bucket: String,
}

impl StorageService {
    pub fn new(
        endpoint: Option<&str>,
        region: &str,
        bucket: &str,
        access_key: &str,
        secret_key: &str,
    ) -> Self {
        let credentials = Credentials::new(access_key, secret_key, None, None, "static");

        let mut builder = Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .credentials_provider(credentials);

        // Custom endpoints (MinIO and friends) need path-style addressing.
        if let Some(endpoint) = endpoint {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        let client = Client::from_conf(builder.build());

        info!("✅ S3 client ready for bucket '{}'", bucket);

        Self {
            client,
            bucket: bucket.to_string(),
        }
    }
}

#[async_trait]
impl ArtifactStore for StorageService {
    async fn put(&self, local: &Path, key: &str) -> Result<String, StorageError> {
        debug!("Uploading {} to s3://{}/{}", local.display(), self.bucket, key);

        let body = ByteStream::from_path(local)
            .await
            .map_err(|e| StorageError::UploadFailed(e.to_string()))?;
        let content_type = mime_guess::from_path(key).first_or_octet_stream().to_string();

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(body)
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| StorageError::UploadFailed(e.to_string()))?;

        info!("✅ Uploaded {} to S3", key);
        Ok(key.to_string())
    }

    async fn get(&self, key: &str, local: &Path) -> Result<(), StorageError> {
        debug!("Downloading s3://{}/{} to {}", self.bucket, key, local.display());

        let resp = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                let msg = e.to_string();
                if msg.contains("NoSuchKey") {
                    StorageError::NotFound(key.to_string())
                } else {
                    StorageError::DownloadFailed(msg)
                }
            })?;

        if let Some(parent) = local.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut reader = resp.body.into_async_read();
        let mut file = tokio::fs::File::create(local).await?;
        tokio::io::copy(&mut reader, &mut file).await?;
        file.flush().await?;

        info!("✅ Downloaded {} from S3 to {}", key, local.display());
        Ok(())
    }

    async fn signed_reference(&self, key: &str, ttl: Duration) -> Result<String, StorageError> {
        let presign_config =
            PresigningConfig::expires_in(ttl).map_err(|e| StorageError::PresignFailed(e.to_string()))?;

        let presigned = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(presign_config)
            .await
            .map_err(|e| StorageError::PresignFailed(e.to_string()))?;

        Ok(presigned.uri().to_string())
    }
}
