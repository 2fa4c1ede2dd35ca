use crate::modules::jobs::error::JobError;
use crate::modules::jobs::scratch::remove_if_present;
use axum::extract::multipart::Field;
use axum::http::StatusCode;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{error, info};
use uuid::Uuid;

/// An upload written to local transient storage.
#[derive(Debug)]
pub struct SavedUpload {
    pub path: PathBuf,
    pub original_name: String,
}

/// Streams a multipart field to `{dir}/{random}.part`, refusing anything over
/// `max_bytes`. The partial file is removed on every error path.
pub async fn save_field_to_disk(
    mut field: Field<'_>,
    dir: &Path,
    max_bytes: usize,
) -> Result<SavedUpload, JobError> {
    let original_name = field.file_name().unwrap_or("video.mp4").to_string();

    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| JobError::Transfer(e.into()))?;
    let path = dir.join(format!("{}.part", Uuid::new_v4()));

    match write_chunks(&mut field, &path, max_bytes).await {
        Ok(size) => {
            info!("Received upload '{}' ({} bytes) at {}", original_name, size, path.display());
            Ok(SavedUpload { path, original_name })
        }
        Err(e) => {
            remove_if_present(&path).await;
            Err(e)
        }
    }
}

async fn write_chunks(field: &mut Field<'_>, path: &Path, max_bytes: usize) -> Result<u64, JobError> {
    let mut file = tokio::fs::File::create(path)
        .await
        .map_err(|e| JobError::Transfer(e.into()))?;
    let mut written: usize = 0;

    loop {
        let chunk = match field.chunk().await {
            Ok(Some(chunk)) => chunk,
            Ok(None) => break,
            Err(e) if e.status() == StatusCode::PAYLOAD_TOO_LARGE => {
                return Err(JobError::validation(upload_limit_message(max_bytes)));
            }
            Err(e) => {
                error!("Upload stream error: {}", e);
                return Err(JobError::validation("Upload interrupted"));
            }
        };

        written += chunk.len();
        if written > max_bytes {
            return Err(JobError::validation(upload_limit_message(max_bytes)));
        }

        file.write_all(&chunk)
            .await
            .map_err(|e| JobError::Transfer(e.into()))?;
    }

    file.flush().await.map_err(|e| JobError::Transfer(e.into()))?;
    Ok(written as u64)
}

pub fn upload_limit_message(max_bytes: usize) -> String {
    format!("File exceeds the {} byte upload limit", max_bytes)
}
