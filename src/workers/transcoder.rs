use crate::modules::jobs::events::EngineEvent;
use crate::modules::jobs::model::Job;
use crate::modules::jobs::service::JobService;
use crate::state::AppState;
use tracing::{error, info};

const NO_OUTCOME: &str = "Transcoder exited without reporting an outcome";

/// Runs a job in its own task. The caller does not wait for it.
pub fn spawn_job(state: AppState, job: Job) {
    tokio::spawn(async move {
        run_job(state, job).await;
    });
}

/// Stages the input, starts the engine and feeds its events, in order, to the
/// orchestrator until the stream closes.
pub async fn run_job(state: AppState, job: Job) {
    let id = job.id;
    info!("🎥 Starting transcoding for job {}", id);

    let input = match JobService::stage_input(&state, &job).await {
        Ok(input) => input,
        Err(e) => {
            error!("❌ Failed to stage input for job {}: {}", id, e);
            JobService::on_engine_event(&state, id, EngineEvent::Failed(e.to_string())).await;
            return;
        }
    };

    let output = state.job_files(id).output;
    let mut events = match state.engine.start(&input, &output).await {
        Ok(events) => events,
        Err(e) => {
            error!("❌ Failed to start transcoder for job {}: {}", id, e);
            JobService::on_engine_event(&state, id, EngineEvent::Failed(e.to_string())).await;
            return;
        }
    };

    let mut saw_terminal = false;
    while let Some(event) = events.recv().await {
        saw_terminal |= event.is_terminal();
        JobService::on_engine_event(&state, id, event).await;
    }

    if !saw_terminal {
        error!("❌ Event stream for job {} closed without an outcome", id);
        JobService::on_engine_event(&state, id, EngineEvent::Failed(NO_OUTCOME.to_string())).await;
    }
}
