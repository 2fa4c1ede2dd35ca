//! Transition table for a single job: current status × engine event → action.

use super::events::EngineEvent;
use super::model::JobStatus;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    MarkProcessing,
    ReportProgress(f64),
    /// Verify and publish the engine output, then complete (or fail) the job.
    Finalize(PathBuf),
    Fail(String),
    Ignore,
}

pub fn next_action(current: JobStatus, event: &EngineEvent) -> Action {
    use JobStatus::*;

    match (current, event) {
        // Terminal states are absorbing.
        (Completed | Failed, _) => Action::Ignore,

        (Queued, EngineEvent::Started) => Action::MarkProcessing,
        (Processing, EngineEvent::Started) => Action::Ignore,

        (Queued | Processing, EngineEvent::Progress(percent)) => Action::ReportProgress(*percent),
        (Queued | Processing, EngineEvent::Succeeded { output }) => Action::Finalize(output.clone()),
        (Queued | Processing, EngineEvent::Failed(cause)) => Action::Fail(cause.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn succeeded() -> EngineEvent {
        EngineEvent::Succeeded {
            output: PathBuf::from("outputs/j.mp4"),
        }
    }

    #[test]
    fn started_moves_queued_to_processing_once() {
        assert_eq!(next_action(JobStatus::Queued, &EngineEvent::Started), Action::MarkProcessing);
        assert_eq!(next_action(JobStatus::Processing, &EngineEvent::Started), Action::Ignore);
    }

    #[test]
    fn progress_never_transitions() {
        assert_eq!(
            next_action(JobStatus::Processing, &EngineEvent::Progress(42.0)),
            Action::ReportProgress(42.0)
        );
    }

    #[test]
    fn terminal_events_on_live_jobs() {
        for live in [JobStatus::Queued, JobStatus::Processing] {
            assert_eq!(
                next_action(live, &succeeded()),
                Action::Finalize(PathBuf::from("outputs/j.mp4"))
            );
            assert_eq!(
                next_action(live, &EngineEvent::Failed("codec error".into())),
                Action::Fail("codec error".into())
            );
        }
    }

    #[test]
    fn terminal_states_absorb_every_event() {
        let events = [
            EngineEvent::Started,
            EngineEvent::Progress(10.0),
            succeeded(),
            EngineEvent::Failed("late".into()),
        ];
        for terminal in [JobStatus::Completed, JobStatus::Failed] {
            for event in &events {
                assert_eq!(next_action(terminal, event), Action::Ignore, "{:?} + {:?}", terminal, event);
            }
        }
    }
}
