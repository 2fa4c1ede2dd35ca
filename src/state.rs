use crate::config::settings::AppConfig;
use crate::infrastructure::storage::ArtifactStore;
use crate::infrastructure::transcoder::TranscodeEngine;
use crate::modules::jobs::repository::JobRepository;
use crate::modules::jobs::scratch::JobFiles;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub jobs: Arc<dyn JobRepository>,
    pub storage: Arc<dyn ArtifactStore>,
    pub engine: Arc<dyn TranscodeEngine>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        jobs: Arc<dyn JobRepository>,
        storage: Arc<dyn ArtifactStore>,
        engine: Arc<dyn TranscodeEngine>,
    ) -> Self {
        Self {
            config,
            jobs,
            storage,
            engine,
        }
    }

    pub fn job_files(&self, id: Uuid) -> JobFiles {
        JobFiles::for_job(&self.config.upload_dir, &self.config.output_dir, id)
    }
}
