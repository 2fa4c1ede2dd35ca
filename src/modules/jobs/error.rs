use crate::common::response::ApiError;
use crate::infrastructure::storage::StorageError;
use crate::infrastructure::transcoder::EngineError;
use axum::http::StatusCode;
use thiserror::Error;

/// Failures of the metadata store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("job store unavailable: {0}")]
    Unavailable(String),

    #[error("job {0} already exists")]
    Duplicate(uuid::Uuid),

    #[error("corrupt job record: {0}")]
    Corrupt(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        StoreError::Unavailable(e.to_string())
    }
}

#[derive(Debug, Error)]
pub enum JobError {
    #[error("{0}")]
    Validation(String),

    /// Missing or rejected bearer credential.
    #[error("{0}")]
    Unauthenticated(&'static str),

    #[error("Job not found or unauthorized")]
    NotFound,

    #[error("Job is not completed yet")]
    NotReady,

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Transfer(#[from] StorageError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl JobError {
    pub fn validation(msg: impl Into<String>) -> Self {
        JobError::Validation(msg.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            JobError::Validation(_) => StatusCode::BAD_REQUEST,
            JobError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            JobError::NotFound => StatusCode::NOT_FOUND,
            JobError::NotReady => StatusCode::CONFLICT,
            JobError::Engine(_) | JobError::Transfer(_) | JobError::Store(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<JobError> for ApiError {
    fn from(e: JobError) -> Self {
        let status = e.status_code();
        let message = if status.is_server_error() {
            tracing::error!("Request failed: {}", e);
            "Server error".to_string()
        } else {
            e.to_string()
        };
        ApiError(message, status)
    }
}
