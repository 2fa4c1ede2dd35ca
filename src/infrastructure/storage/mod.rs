use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

pub mod s3;

pub use s3::StorageService;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Presign failed: {0}")]
    PresignFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Moves artifacts between local transient storage and the durable object store.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Uploads `local` under `key`, returning the durable reference.
    async fn put(&self, local: &Path, key: &str) -> Result<String, StorageError>;

    /// Downloads `key` into `local`, creating parent directories as needed.
    async fn get(&self, key: &str, local: &Path) -> Result<(), StorageError>;

    /// Mints a time-limited retrieval URL for `key`.
    async fn signed_reference(&self, key: &str, ttl: Duration) -> Result<String, StorageError>;
}
