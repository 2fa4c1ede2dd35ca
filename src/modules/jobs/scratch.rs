//! Local transient files owned by a single job.
//!
//! Every path is derived from the job id so no two jobs can share one.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobFiles {
    /// The upload as received, before staging.
    pub upload: PathBuf,
    /// The file handed to the engine.
    pub input: PathBuf,
    /// The engine's output.
    pub output: PathBuf,
}

impl JobFiles {
    pub fn for_job(upload_dir: &Path, output_dir: &Path, id: Uuid) -> Self {
        Self {
            upload: upload_dir.join(format!("{}.upload", id)),
            input: upload_dir.join(format!("{}.input", id)),
            output: output_dir.join(format!("{}.mp4", id)),
        }
    }

    /// Removes every file of the job that still exists and returns how many were removed.
    /// Consumes the set so a given handle cannot clean up twice.
    pub async fn remove_all(self) -> usize {
        let mut removed = 0;
        for path in [self.upload, self.input, self.output] {
            if remove_if_present(&path).await {
                removed += 1;
            }
        }
        removed
    }
}

/// Deletes `path`, treating an already-missing file as success. Returns whether a file was removed.
pub async fn remove_if_present(path: &Path) -> bool {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {
            debug!("Removed {}", path.display());
            true
        }
        Err(e) if e.kind() == ErrorKind::NotFound => false,
        Err(e) => {
            warn!("Failed to remove {}: {}", path.display(), e);
            false
        }
    }
}

/// Basename of a client-supplied file name, restricted to a safe character set.
pub fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') { c } else { '_' })
        .collect();
    let trimmed = cleaned.trim_start_matches('.');
    if trimmed.is_empty() {
        "video".to_string()
    } else {
        trimmed.to_string()
    }
}
