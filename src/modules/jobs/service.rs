use super::dto::RetrievalReference;
use super::error::JobError;
use super::events::EngineEvent;
use super::lifecycle::{self, Action};
use super::model::{Job, JobPatch, JobStatus};
use super::scratch::{self, JobFiles, sanitize_file_name};
use crate::infrastructure::storage::StorageError;
use crate::infrastructure::transcoder::EngineError;
use crate::state::AppState;
use crate::workers::transcoder;
use std::path::{Path, PathBuf};
use time::OffsetDateTime;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

pub struct JobService;

impl JobService {
    fn input_key(job: &Job) -> String {
        format!("inputs/{}-{}", job.id, sanitize_file_name(&job.original_name))
    }

    fn output_key(id: Uuid) -> String {
        format!("outputs/{}.mp4", id)
    }

    // --- SUBMISSION ---

    /// Validates the upload, records a queued job and starts it in the background.
    /// Returns as soon as the job is recorded; transcoding continues asynchronously.
    pub async fn submit(
        state: &AppState,
        owner: &str,
        local_input: &Path,
        original_name: &str,
    ) -> Result<Uuid, JobError> {
        if let Err(e) = Self::validate_input(state, local_input).await {
            scratch::remove_if_present(local_input).await;
            warn!("Rejected upload '{}' from {}: {}", original_name, owner, e);
            return Err(e);
        }

        let job = Job::new(owner, original_name);
        let files = state.job_files(job.id);

        if let Err(e) = Self::claim_upload(local_input, &files.upload).await {
            scratch::remove_if_present(local_input).await;
            error!("Failed to move upload for job {}: {}", job.id, e);
            return Err(StorageError::Io(e).into());
        }

        if let Err(e) = state.jobs.create(&job).await {
            scratch::remove_if_present(&files.upload).await;
            error!("Failed to record job {}: {}", job.id, e);
            return Err(e.into());
        }

        info!("Job {} queued for {} ('{}')", job.id, owner, original_name);
        transcoder::spawn_job(state.clone(), job.clone());

        Ok(job.id)
    }

    async fn validate_input(state: &AppState, local_input: &Path) -> Result<(), JobError> {
        let metadata = tokio::fs::metadata(local_input)
            .await
            .map_err(|_| JobError::validation("Uploaded file could not be read"))?;
        if !metadata.is_file() {
            return Err(JobError::validation("Uploaded file could not be read"));
        }
        if metadata.len() == 0 {
            return Err(JobError::validation("Uploaded file is empty"));
        }

        match state.engine.validate(local_input).await {
            Ok(()) => Ok(()),
            Err(EngineError::Rejected(reason)) => Err(JobError::Validation(reason)),
            Err(e) => Err(e.into()),
        }
    }

    async fn claim_upload(from: &Path, to: &Path) -> std::io::Result<()> {
        if let Some(parent) = to.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::rename(from, to).await
    }

    /// Produces the engine input for a job. With input persistence enabled the
    /// upload is stored durably first and the engine copy is fetched back from
    /// the durable store; otherwise the upload is moved into place.
    pub(crate) async fn stage_input(state: &AppState, job: &Job) -> Result<PathBuf, JobError> {
        let files = state.job_files(job.id);

        if !state.config.persist_inputs {
            tokio::fs::rename(&files.upload, &files.input)
                .await
                .map_err(StorageError::Io)?;
            return Ok(files.input);
        }

        let key = Self::input_key(job);
        let input_ref = state.storage.put(&files.upload, &key).await?;
        if state
            .jobs
            .update(job.id, JobPatch::input_stored(input_ref.clone()))
            .await?
            .is_none()
        {
            debug!("Job {} finished before its input reference was recorded", job.id);
        }
        scratch::remove_if_present(&files.upload).await;

        state.storage.get(&input_ref, &files.input).await?;
        info!("Staged input for job {} from {}", job.id, input_ref);
        Ok(files.input)
    }

    // --- ENGINE EVENTS ---

    /// Reacts to one engine event for `id`. Failures are absorbed into the job's
    /// state or logged; nothing propagates to a caller.
    pub(crate) async fn on_engine_event(state: &AppState, id: Uuid, event: EngineEvent) {
        let current = match state.jobs.get(id).await {
            Ok(Some(job)) => job.status,
            Ok(None) => {
                warn!("Engine event '{}' for unknown job {}", event.name(), id);
                return;
            }
            Err(e) => {
                error!("Job {}: could not load record for '{}' event: {}", id, event.name(), e);
                if event.is_terminal() {
                    Self::cleanup(state, id, &event).await;
                }
                return;
            }
        };

        match lifecycle::next_action(current, &event) {
            Action::MarkProcessing => match state.jobs.update(id, JobPatch::processing()).await {
                Ok(Some(_)) => info!("Job {} is processing", id),
                Ok(None) => debug!("Job {} left the queue before it was marked processing", id),
                Err(e) => error!("Job {}: failed to record processing state: {}", id, e),
            },
            Action::ReportProgress(percent) => {
                debug!("Transcoding progress for job {}: {:.2}%", id, percent);
            }
            Action::Finalize(output) => {
                let patch = match Self::publish_output(state, id, &output).await {
                    Ok(output_ref) => JobPatch::completed(output_ref),
                    Err(cause) => JobPatch::failed(cause),
                };
                // Local copies are gone before the job is observable as terminal.
                Self::cleanup(state, id, &event).await;
                Self::record_terminal(state, id, patch).await;
            }
            Action::Fail(cause) => {
                Self::cleanup(state, id, &event).await;
                Self::record_terminal(state, id, JobPatch::failed(cause)).await;
            }
            Action::Ignore => {
                debug!("Ignoring '{}' event for job {} in state {}", event.name(), id, current);
            }
        }
    }

    /// Checks the engine output and moves it to durable storage. The error side
    /// is the failure cause to record on the job.
    async fn publish_output(state: &AppState, id: Uuid, output: &Path) -> Result<String, String> {
        let size = tokio::fs::metadata(output).await.map(|m| m.len()).unwrap_or(0);
        if size == 0 {
            return Err("Transcoded file is empty".to_string());
        }
        info!("Transcoded file for job {}: {} bytes", id, size);

        state
            .storage
            .put(output, &Self::output_key(id))
            .await
            .map_err(|e| e.to_string())
    }

    async fn record_terminal(state: &AppState, id: Uuid, patch: JobPatch) {
        let outcome = patch.status.unwrap_or(JobStatus::Failed);

        match state.jobs.update(id, patch).await {
            Ok(Some(job)) => match job.status {
                JobStatus::Completed => info!("Job {} completed successfully", id),
                _ => warn!("Job {} failed: {}", id, job.error.as_deref().unwrap_or_default()),
            },
            Ok(None) => debug!("Job {} was already terminal; {} outcome dropped", id, outcome),
            Err(e) if outcome == JobStatus::Completed => {
                error!("Job {}: failed to record completion: {}", id, e);
                if let Err(e) = state.jobs.update(id, JobPatch::failed(e.to_string())).await {
                    error!("Job {}: outcome lost, store unreachable: {}", id, e);
                }
            }
            Err(e) => error!("Job {}: outcome lost, store unreachable: {}", id, e),
        }
    }

    async fn cleanup(state: &AppState, id: Uuid, event: &EngineEvent) {
        let files: JobFiles = state.job_files(id);
        let mut removed = 0;
        if let EngineEvent::Succeeded { output } = event {
            if *output != files.output && scratch::remove_if_present(output).await {
                removed += 1;
            }
        }
        removed += files.remove_all().await;
        info!("Cleaned up {} local file(s) for job {}", removed, id);
    }

    // --- QUERIES ---

    pub async fn get_status(state: &AppState, id: Uuid, requester: &str) -> Result<Job, JobError> {
        match state.jobs.get(id).await? {
            Some(job) if job.is_owned_by(requester) => Ok(job),
            _ => Err(JobError::NotFound),
        }
    }

    pub async fn get_retrieval_reference(
        state: &AppState,
        id: Uuid,
        requester: &str,
    ) -> Result<RetrievalReference, JobError> {
        let job = Self::get_status(state, id, requester).await?;

        let output_ref = match (job.status, job.output_ref) {
            (JobStatus::Completed, Some(output_ref)) => output_ref,
            _ => return Err(JobError::NotReady),
        };

        let ttl = state.config.signed_url_ttl();
        let url = state.storage.signed_reference(&output_ref, ttl).await?;

        Ok(RetrievalReference {
            url,
            expires_at: OffsetDateTime::now_utc() + ttl,
        })
    }
}
