use super::error::StoreError;
use super::model::{Job, JobPatch, JobStatus};
use async_trait::async_trait;
use sqlx::{FromRow, PgPool};
use std::collections::HashMap;
use std::sync::Mutex;
use time::OffsetDateTime;
use uuid::Uuid;

/// Keyed job records with atomic per-key updates.
#[async_trait]
pub trait JobRepository: Send + Sync {
    async fn create(&self, job: &Job) -> Result<(), StoreError>;

    /// Applies `patch` atomically if the record's current status allows it.
    /// Returns the updated record, or `None` when the job is unknown or the
    /// patch was refused (for example because the job is already terminal).
    async fn update(&self, id: Uuid, patch: JobPatch) -> Result<Option<Job>, StoreError>;

    async fn get(&self, id: Uuid) -> Result<Option<Job>, StoreError>;
}

// --- POSTGRES ---

pub struct PgJobRepository {
    pool: PgPool,
}

impl PgJobRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct JobRow {
    id: Uuid,
    owner: String,
    status: String,
    original_name: String,
    input_ref: Option<String>,
    output_ref: Option<String>,
    error: Option<String>,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl TryFrom<JobRow> for Job {
    type Error = StoreError;

    fn try_from(row: JobRow) -> Result<Self, Self::Error> {
        Ok(Job {
            id: row.id,
            owner: row.owner,
            status: JobStatus::try_from(row.status.as_str()).map_err(StoreError::Corrupt)?,
            original_name: row.original_name,
            input_ref: row.input_ref,
            output_ref: row.output_ref,
            error: row.error,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[async_trait]
impl JobRepository for PgJobRepository {
    async fn create(&self, job: &Job) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO jobs (id, owner, status, original_name, input_ref, output_ref, error, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(job.id)
        .bind(&job.owner)
        .bind(job.status.as_str())
        .bind(&job.original_name)
        .bind(&job.input_ref)
        .bind(&job.output_ref)
        .bind(&job.error)
        .bind(job.created_at)
        .bind(job.updated_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Duplicate(job.id));
        }
        Ok(())
    }

    async fn update(&self, id: Uuid, patch: JobPatch) -> Result<Option<Job>, StoreError> {
        let allowed: Vec<String> = patch
            .required_current()
            .iter()
            .map(|s| s.as_str().to_string())
            .collect();

        // The status guard and the write happen in one statement, so concurrent
        // events on the same job cannot both win a terminal transition.
        let row = sqlx::query_as::<_, JobRow>(
            r#"
            UPDATE jobs
            SET status = COALESCE($2, status),
                input_ref = COALESCE($3, input_ref),
                output_ref = COALESCE($4, output_ref),
                error = COALESCE($5, error),
                updated_at = NOW()
            WHERE id = $1 AND status = ANY($6)
            RETURNING id, owner, status, original_name, input_ref, output_ref, error, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(patch.status.map(|s| s.as_str()))
        .bind(&patch.input_ref)
        .bind(&patch.output_ref)
        .bind(&patch.error)
        .bind(&allowed)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Job::try_from).transpose()
    }

    async fn get(&self, id: Uuid) -> Result<Option<Job>, StoreError> {
        let row = sqlx::query_as::<_, JobRow>(
            r#"
            SELECT id, owner, status, original_name, input_ref, output_ref, error, created_at, updated_at
            FROM jobs
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Job::try_from).transpose()
    }
}

// --- IN-PROCESS ---

/// Job records held in process memory behind a single lock. Suitable for
/// single-node deployments that accept losing records on restart.
#[derive(Default)]
pub struct MemoryJobRepository {
    jobs: Mutex<HashMap<Uuid, Job>>,
}

impl MemoryJobRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<Uuid, Job>>, StoreError> {
        self.jobs
            .lock()
            .map_err(|_| StoreError::Unavailable("job table lock poisoned".to_string()))
    }
}

#[async_trait]
impl JobRepository for MemoryJobRepository {
    async fn create(&self, job: &Job) -> Result<(), StoreError> {
        let mut jobs = self.lock()?;
        if jobs.contains_key(&job.id) {
            return Err(StoreError::Duplicate(job.id));
        }
        jobs.insert(job.id, job.clone());
        Ok(())
    }

    async fn update(&self, id: Uuid, patch: JobPatch) -> Result<Option<Job>, StoreError> {
        let mut jobs = self.lock()?;
        let Some(job) = jobs.get_mut(&id) else {
            return Ok(None);
        };
        if !patch.applies_to(job.status) {
            return Ok(None);
        }
        job.apply(&patch);
        Ok(Some(job.clone()))
    }

    async fn get(&self, id: Uuid) -> Result<Option<Job>, StoreError> {
        Ok(self.lock()?.get(&id).cloned())
    }
}
