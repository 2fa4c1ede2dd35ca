use crate::modules::jobs::events::EngineEvent;
use async_trait::async_trait;
use std::path::Path;
use thiserror::Error;
use tokio::sync::mpsc;

pub mod ffmpeg;
pub mod probe;
pub mod progress;

pub use ffmpeg::{FfmpegEngine, FfmpegSettings};

#[derive(Debug, Error)]
pub enum EngineError {
    /// The input was inspected and refused.
    #[error("{0}")]
    Rejected(String),

    #[error("failed to launch {bin}: {reason}")]
    Launch { bin: String, reason: String },
}

#[async_trait]
pub trait TranscodeEngine: Send + Sync {
    /// Checks that `input` holds at least one decodable video stream.
    async fn validate(&self, input: &Path) -> Result<(), EngineError>;

    /// Starts transcoding `input` into `output`. The returned channel yields the
    /// job's events in order and closes once the engine is done.
    async fn start(
        &self,
        input: &Path,
        output: &Path,
    ) -> Result<mpsc::Receiver<EngineEvent>, EngineError>;
}
