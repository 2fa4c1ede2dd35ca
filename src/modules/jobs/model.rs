use serde::{Deserialize, Serialize};
use std::fmt;
use time::OffsetDateTime;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// States a job may be in immediately before entering `self`.
    /// Re-entering `processing` is allowed so a repeated `started` stays harmless.
    pub fn allowed_predecessors(&self) -> &'static [JobStatus] {
        match self {
            JobStatus::Queued => &[],
            JobStatus::Processing => &[JobStatus::Queued, JobStatus::Processing],
            JobStatus::Completed | JobStatus::Failed => &[JobStatus::Queued, JobStatus::Processing],
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for JobStatus {
    type Error = String;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "queued" => Ok(JobStatus::Queued),
            "processing" => Ok(JobStatus::Processing),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            other => Err(format!("unknown job status '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub owner: String,
    pub status: JobStatus,
    pub original_name: String,
    pub input_ref: Option<String>,
    pub output_ref: Option<String>,
    pub error: Option<String>,
    #[serde(with = "time::serde::iso8601")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::iso8601")]
    pub updated_at: OffsetDateTime,
}

impl Job {
    pub fn new(owner: &str, original_name: &str) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            id: Uuid::new_v4(),
            owner: owner.to_string(),
            status: JobStatus::Queued,
            original_name: original_name.to_string(),
            input_ref: None,
            output_ref: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_owned_by(&self, principal: &str) -> bool {
        self.owner == principal
    }

    /// Applies a patch in place. Callers are expected to have checked
    /// [`JobPatch::applies_to`] first.
    pub fn apply(&mut self, patch: &JobPatch) {
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(input_ref) = &patch.input_ref {
            self.input_ref = Some(input_ref.clone());
        }
        if let Some(output_ref) = &patch.output_ref {
            self.output_ref = Some(output_ref.clone());
        }
        if let Some(error) = &patch.error {
            self.error = Some(error.clone());
        }
        self.updated_at = OffsetDateTime::now_utc();
    }
}

/// A partial update of a job record. Built through the named constructors so
/// that `output_ref` only ever travels with `completed` and `error` with `failed`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobPatch {
    pub status: Option<JobStatus>,
    pub input_ref: Option<String>,
    pub output_ref: Option<String>,
    pub error: Option<String>,
}

impl JobPatch {
    pub fn processing() -> Self {
        Self {
            status: Some(JobStatus::Processing),
            ..Self::default()
        }
    }

    pub fn completed(output_ref: impl Into<String>) -> Self {
        Self {
            status: Some(JobStatus::Completed),
            output_ref: Some(output_ref.into()),
            ..Self::default()
        }
    }

    pub fn failed(cause: impl Into<String>) -> Self {
        Self {
            status: Some(JobStatus::Failed),
            error: Some(cause.into()),
            ..Self::default()
        }
    }

    pub fn input_stored(input_ref: impl Into<String>) -> Self {
        Self {
            input_ref: Some(input_ref.into()),
            ..Self::default()
        }
    }

    /// Statuses the record must currently hold for this patch to be accepted.
    /// Patches without a status change are only accepted on live jobs.
    pub fn required_current(&self) -> &'static [JobStatus] {
        match self.status {
            Some(next) => next.allowed_predecessors(),
            None => &[JobStatus::Queued, JobStatus::Processing],
        }
    }

    pub fn applies_to(&self, current: JobStatus) -> bool {
        self.required_current().contains(&current)
    }
}
