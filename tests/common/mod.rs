//! Shared fixtures: scripted engine, in-memory object store and an instrumented job store.

#![allow(dead_code)]

use async_trait::async_trait;
use jsonwebtoken::{EncodingKey, Header, encode, get_current_timestamp};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::mpsc;
use transcoder::config::settings::{AppConfig, StoreBackend};
use transcoder::infrastructure::storage::{ArtifactStore, StorageError};
use transcoder::infrastructure::transcoder::{EngineError, TranscodeEngine};
use transcoder::middleware::auth::TokenClaims;
use transcoder::modules::jobs::error::StoreError;
use transcoder::modules::jobs::events::EngineEvent;
use transcoder::modules::jobs::model::{Job, JobPatch, JobStatus};
use transcoder::modules::jobs::repository::{JobRepository, MemoryJobRepository};
use transcoder::state::AppState;
use uuid::Uuid;

pub const JWT_SECRET: &str = "test-secret";

/// Uploads starting with this marker are refused by [`ScriptedEngine::validate`].
pub const NOT_A_VIDEO: &[u8] = b"NOVIDEO";

// --- ENGINE ---

/// One engine invocation, handed to the test so it can play the engine's part.
pub struct EngineRun {
    pub input: PathBuf,
    pub output: PathBuf,
    pub events: mpsc::Sender<EngineEvent>,
}

impl EngineRun {
    pub async fn send(&self, event: EngineEvent) {
        self.events.send(event).await.expect("worker dropped the event stream");
    }

    /// Writes `bytes` to the output path and reports success.
    pub async fn succeed_with(&self, bytes: &[u8]) {
        tokio::fs::write(&self.output, bytes).await.unwrap();
        self.send(EngineEvent::Succeeded {
            output: self.output.clone(),
        })
        .await;
    }
}

pub struct ScriptedEngine {
    runs: mpsc::UnboundedSender<EngineRun>,
}

#[async_trait]
impl TranscodeEngine for ScriptedEngine {
    async fn validate(&self, input: &Path) -> Result<(), EngineError> {
        let bytes = tokio::fs::read(input)
            .await
            .map_err(|_| EngineError::Rejected("Invalid or unsupported video file".to_string()))?;
        if bytes.starts_with(NOT_A_VIDEO) {
            return Err(EngineError::Rejected("No video stream found".to_string()));
        }
        Ok(())
    }

    async fn start(
        &self,
        input: &Path,
        output: &Path,
    ) -> Result<mpsc::Receiver<EngineEvent>, EngineError> {
        let (tx, rx) = mpsc::channel(16);
        let run = EngineRun {
            input: input.to_path_buf(),
            output: output.to_path_buf(),
            events: tx,
        };
        self.runs.send(run).map_err(|_| EngineError::Launch {
            bin: "scripted".to_string(),
            reason: "test harness gone".to_string(),
        })?;
        Ok(rx)
    }
}

// --- OBJECT STORE ---

#[derive(Default)]
pub struct FakeObjectStore {
    objects: Mutex<HashMap<String, Vec<u8>>>,
    puts: Mutex<Vec<String>>,
    pub fail_output_puts: AtomicBool,
}

impl FakeObjectStore {
    pub fn object(&self, key: &str) -> Option<Vec<u8>> {
        self.objects.lock().unwrap().get(key).cloned()
    }

    pub fn put_count(&self, key: &str) -> usize {
        self.puts.lock().unwrap().iter().filter(|k| k.as_str() == key).count()
    }

    pub fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        self.puts
            .lock()
            .unwrap()
            .iter()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl ArtifactStore for FakeObjectStore {
    async fn put(&self, local: &Path, key: &str) -> Result<String, StorageError> {
        if key.starts_with("outputs/") && self.fail_output_puts.load(Ordering::SeqCst) {
            return Err(StorageError::UploadFailed("bucket is read-only".to_string()));
        }
        let bytes = tokio::fs::read(local).await?;
        self.puts.lock().unwrap().push(key.to_string());
        self.objects.lock().unwrap().insert(key.to_string(), bytes);
        Ok(key.to_string())
    }

    async fn get(&self, key: &str, local: &Path) -> Result<(), StorageError> {
        let bytes = self
            .object(key)
            .ok_or_else(|| StorageError::NotFound(key.to_string()))?;
        if let Some(parent) = local.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(local, bytes).await?;
        Ok(())
    }

    async fn signed_reference(&self, key: &str, ttl: Duration) -> Result<String, StorageError> {
        if self.object(key).is_none() {
            return Err(StorageError::NotFound(key.to_string()));
        }
        Ok(format!("https://objects.test/{}?expires={}", key, ttl.as_secs()))
    }
}

// --- JOB STORE ---

/// Memory-backed job store that counts reads, can refuse completion writes and
/// notes which job-owned local files still exist when a terminal write lands.
#[derive(Default)]
pub struct InstrumentedRepository {
    inner: MemoryJobRepository,
    gets: AtomicUsize,
    pub fail_completed: AtomicBool,
    scratch_dirs: Vec<PathBuf>,
    terminal_writes: Mutex<Vec<(Uuid, JobStatus, Vec<PathBuf>)>>,
}

impl InstrumentedRepository {
    pub fn watching(scratch_dirs: Vec<PathBuf>) -> Self {
        Self {
            scratch_dirs,
            ..Self::default()
        }
    }

    /// Terminal writes applied so far, with the job's local files present at that moment.
    pub fn terminal_writes(&self) -> Vec<(Uuid, JobStatus, Vec<PathBuf>)> {
        self.terminal_writes.lock().unwrap().clone()
    }

    fn files_of(&self, id: Uuid) -> Vec<PathBuf> {
        let prefix = id.to_string();
        self.scratch_dirs
            .iter()
            .flat_map(|dir| std::fs::read_dir(dir).into_iter().flatten())
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with(&prefix))
            })
            .collect()
    }

    /// Reads a record without counting it as an orchestrator lookup.
    pub async fn snapshot(&self, id: Uuid) -> Option<Job> {
        self.inner.get(id).await.unwrap()
    }

    pub fn gets(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl JobRepository for InstrumentedRepository {
    async fn create(&self, job: &Job) -> Result<(), StoreError> {
        self.inner.create(job).await
    }

    async fn update(&self, id: Uuid, patch: JobPatch) -> Result<Option<Job>, StoreError> {
        if patch.status == Some(JobStatus::Completed) && self.fail_completed.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("connection reset".to_string()));
        }
        let present = self.files_of(id);
        let updated = self.inner.update(id, patch).await?;
        if let Some(job) = updated.as_ref().filter(|job| job.status.is_terminal()) {
            self.terminal_writes
                .lock()
                .unwrap()
                .push((id, job.status, present));
        }
        Ok(updated)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Job>, StoreError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.inner.get(id).await
    }
}

// --- HARNESS ---

pub struct Harness {
    pub state: AppState,
    pub jobs: Arc<InstrumentedRepository>,
    pub store: Arc<FakeObjectStore>,
    pub runs: mpsc::UnboundedReceiver<EngineRun>,
    pub dir: TempDir,
}

pub fn test_config(root: &Path, persist_inputs: bool) -> AppConfig {
    AppConfig {
        server_port: 0,
        job_store: StoreBackend::Memory,
        database_url: None,
        s3_endpoint: None,
        s3_bucket: "videos".to_string(),
        s3_region: "us-east-1".to_string(),
        s3_access_key: "test".to_string(),
        s3_secret_key: "test".to_string(),
        jwt_secret: JWT_SECRET.to_string(),
        upload_dir: root.join("uploads"),
        output_dir: root.join("outputs"),
        max_upload_bytes: 1024 * 1024,
        signed_url_ttl_secs: 3600,
        persist_inputs,
        ffmpeg_bin: "ffmpeg".to_string(),
        ffprobe_bin: "ffprobe".to_string(),
        ffmpeg_preset: "veryslow".to_string(),
        ffmpeg_crf: 28,
    }
}

impl Harness {
    pub fn new() -> Self {
        Self::with_input_persistence(true)
    }

    pub fn with_input_persistence(persist_inputs: bool) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path(), persist_inputs);
        std::fs::create_dir_all(&config.upload_dir).unwrap();
        std::fs::create_dir_all(&config.output_dir).unwrap();

        let (tx, runs) = mpsc::unbounded_channel();
        let jobs = Arc::new(InstrumentedRepository::watching(vec![
            config.upload_dir.clone(),
            config.output_dir.clone(),
        ]));
        let store = Arc::new(FakeObjectStore::default());
        let engine = Arc::new(ScriptedEngine { runs: tx });

        let state = AppState::new(config, jobs.clone(), store.clone(), engine);

        Self {
            state,
            jobs,
            store,
            runs,
            dir,
        }
    }

    /// Drops `bytes` into the upload directory the way the HTTP layer would.
    pub async fn stage_upload(&self, bytes: &[u8]) -> PathBuf {
        let path = self
            .state
            .config
            .upload_dir
            .join(format!("{}.part", Uuid::new_v4()));
        tokio::fs::write(&path, bytes).await.unwrap();
        path
    }

    pub async fn next_run(&mut self) -> EngineRun {
        tokio::time::timeout(Duration::from_secs(5), self.runs.recv())
            .await
            .expect("engine was never started")
            .expect("engine channel closed")
    }

    pub async fn wait_for_status(&self, id: Uuid, status: JobStatus) -> Job {
        for _ in 0..500 {
            if let Some(job) = self.jobs.snapshot(id).await {
                if job.status == status {
                    return job;
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!(
            "job {} never reached {}; last seen {:?}",
            id,
            status,
            self.jobs.snapshot(id).await.map(|j| j.status)
        );
    }

    /// Waits until the orchestrator has looked the job up `count` more times than `since`.
    pub async fn wait_for_lookups(&self, since: usize, count: usize) {
        for _ in 0..500 {
            if self.jobs.gets() >= since + count {
                // Let the handler finish whatever follows the lookup.
                tokio::time::sleep(Duration::from_millis(50)).await;
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("orchestrator performed {} of {} lookups", self.jobs.gets() - since, count);
    }

    /// Waits until neither transient directory holds any file.
    pub async fn wait_for_empty_scratch(&self) {
        for _ in 0..500 {
            if self.scratch_files().is_empty() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("transient files left behind: {:?}", self.scratch_files());
    }

    pub fn scratch_files(&self) -> Vec<PathBuf> {
        let config = &self.state.config;
        [&config.upload_dir, &config.output_dir]
            .into_iter()
            .flat_map(|dir| std::fs::read_dir(dir).into_iter().flatten())
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .collect()
    }
}

pub fn assert_record_invariants(job: &Job) {
    assert_eq!(
        job.output_ref.is_some(),
        job.status == JobStatus::Completed,
        "outputRef must be present exactly when completed: {:?}",
        job
    );
    assert_eq!(
        job.error.is_some(),
        job.status == JobStatus::Failed,
        "error must be present exactly when failed: {:?}",
        job
    );
}

pub fn bearer_for(username: &str) -> String {
    let now = get_current_timestamp() as usize;
    let claims = TokenClaims {
        sub: format!("{}-sub", username),
        username: Some(username.to_string()),
        exp: now + 900,
        iat: now,
    };
    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .unwrap();
    format!("Bearer {}", token)
}
