use std::path::PathBuf;

/// Lifecycle notifications emitted by a transcode engine for a single job.
/// A stream carries at most one terminal event (`Succeeded` or `Failed`).
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    Started,
    Progress(f64),
    Succeeded { output: PathBuf },
    Failed(String),
}

impl EngineEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, EngineEvent::Succeeded { .. } | EngineEvent::Failed(_))
    }

    pub fn name(&self) -> &'static str {
        match self {
            EngineEvent::Started => "started",
            EngineEvent::Progress(_) => "progress",
            EngineEvent::Succeeded { .. } => "succeeded",
            EngineEvent::Failed(_) => "failed",
        }
    }
}
