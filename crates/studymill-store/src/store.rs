use crate::{schema, Result, StoreError};
use chrono::{DateTime, Duration, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use studymill_core::{retry_delay_seconds, truncate_message};
use studymill_core::{JobId, JobStatus, StudyJob, MAX_STORED_ERROR_LEN};
use tracing::{debug, info};

/// Postgres-backed store for the job queue and study results.
///
/// The queue lives in the `study_jobs` table. Workers claim jobs with
/// `SELECT ... FOR UPDATE SKIP LOCKED`, so any number of workers can poll
/// the same table without handing out a job twice.
#[derive(Debug, Clone)]
pub struct Store {
    pool: PgPool,
}

/// Row shape of `study_jobs`
#[derive(Debug, sqlx::FromRow)]
struct JobRow {
    id: JobId,
    study_id: i64,
    filename: String,
    kind: String,
    status: String,
    attempts: i32,
    max_attempts: i32,
    last_error: Option<String>,
    created_at: DateTime<Utc>,
    scheduled_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    claimed_by: Option<String>,
    claimed_at: Option<DateTime<Utc>>,
}

impl JobRow {
    fn into_job(self) -> Result<StudyJob> {
        Ok(StudyJob {
            id: self.id,
            study_id: self.study_id,
            filename: self.filename,
            kind: self.kind,
            status: JobStatus::parse(&self.status)?,
            attempts: self.attempts,
            max_attempts: self.max_attempts,
            last_error: self.last_error,
            created_at: self.created_at,
            scheduled_at: self.scheduled_at,
            updated_at: self.updated_at,
            claimed_by: self.claimed_by,
            claimed_at: self.claimed_at,
        })
    }
}

impl Store {
    /// Connect to the database
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .acquire_timeout(std::time::Duration::from_secs(5))
            .connect(url)
            .await?;

        Ok(Store { pool })
    }

    /// Build a store without touching the database; connections open on
    /// first use. Lets the worker start while the database is still coming
    /// up and retry from its own backoff loop.
    pub fn connect_lazy(url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .acquire_timeout(std::time::Duration::from_secs(5))
            .connect_lazy(url)?;

        Ok(Store { pool })
    }

    /// Wrap an existing pool
    pub fn with_pool(pool: PgPool) -> Self {
        Store { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Verify/bootstrap the schema. Safe to run on every startup.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::raw_sql(schema::SCHEMA).execute(&self.pool).await?;
        info!("Database schema verified");
        Ok(())
    }

    /// Insert a new pending job into the queue
    pub async fn enqueue(&self, job: &StudyJob) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO study_jobs
                (id, study_id, filename, kind, status, attempts, max_attempts,
                 last_error, created_at, scheduled_at, updated_at, claimed_by, claimed_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(job.id)
        .bind(job.study_id)
        .bind(&job.filename)
        .bind(&job.kind)
        .bind(job.status.as_str())
        .bind(job.attempts)
        .bind(job.max_attempts)
        .bind(&job.last_error)
        .bind(job.created_at)
        .bind(job.scheduled_at)
        .bind(job.updated_at)
        .bind(&job.claimed_by)
        .bind(job.claimed_at)
        .execute(&self.pool)
        .await?;

        debug!(job_id = %job.id, study_id = job.study_id, "Enqueued job");
        Ok(())
    }

    /// Atomically claim the next due job of one of the given kinds.
    ///
    /// Picks the oldest due job whose status is `pending` or `failed`
    /// (failed jobs become due again once their retry delay elapses),
    /// marks it `running` and increments its attempt counter.
    ///
    /// Returns `None` when nothing is due.
    pub async fn claim_next(&self, worker_id: &str, kinds: &[String]) -> Result<Option<StudyJob>> {
        let mut tx = self.pool.begin().await?;

        let row: Option<JobRow> = sqlx::query_as(
            r#"
            SELECT id, study_id, filename, kind, status, attempts, max_attempts,
                   last_error, created_at, scheduled_at, updated_at, claimed_by, claimed_at
            FROM study_jobs
            WHERE kind = ANY($1)
              AND status IN ('pending', 'failed')
              AND scheduled_at <= now()
            ORDER BY scheduled_at ASC, created_at ASC
            LIMIT 1
            FOR UPDATE SKIP LOCKED
            "#,
        )
        .bind(kinds)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            tx.rollback().await?;
            return Ok(None);
        };

        let now = Utc::now();
        sqlx::query(
            r#"
            UPDATE study_jobs
            SET status = 'running', attempts = attempts + 1,
                claimed_by = $1, claimed_at = $2, updated_at = $2
            WHERE id = $3
            "#,
        )
        .bind(worker_id)
        .bind(now)
        .bind(row.id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        let mut job = row.into_job()?;
        job.status = JobStatus::Running;
        job.attempts += 1;
        job.claimed_by = Some(worker_id.to_string());
        job.claimed_at = Some(now);
        job.updated_at = now;

        debug!(job_id = %job.id, worker_id, attempt = job.attempts, "Claimed job");
        Ok(Some(job))
    }

    /// Mark a running job as completed
    pub async fn complete(&self, job_id: JobId) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE study_jobs
            SET status = 'completed', claimed_by = NULL, claimed_at = NULL, updated_at = $1
            WHERE id = $2 AND status = 'running'
            "#,
        )
        .bind(Utc::now())
        .bind(job_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::JobNotFound(job_id));
        }

        debug!(job_id = %job_id, "Completed job");
        Ok(())
    }

    /// Record a failed attempt.
    ///
    /// While attempts remain the job goes back to `failed` with its next
    /// run pushed out by the exponential retry delay; once attempts are
    /// exhausted it is dead-lettered. Returns the resulting status.
    pub async fn fail(&self, job_id: JobId, error: &str) -> Result<JobStatus> {
        let mut tx = self.pool.begin().await?;

        let row: Option<(i32, i32)> = sqlx::query_as(
            "SELECT attempts, max_attempts FROM study_jobs WHERE id = $1 FOR UPDATE",
        )
        .bind(job_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some((attempts, max_attempts)) = row else {
            tx.rollback().await?;
            return Err(StoreError::JobNotFound(job_id));
        };

        let error = truncate_message(error, MAX_STORED_ERROR_LEN);
        let now = Utc::now();

        let status = if attempts >= max_attempts {
            JobStatus::Dead
        } else {
            JobStatus::Failed
        };
        let scheduled_at = match status {
            JobStatus::Failed => now + Duration::seconds(retry_delay_seconds(attempts) as i64),
            _ => now,
        };

        sqlx::query(
            r#"
            UPDATE study_jobs
            SET status = $1, last_error = $2, scheduled_at = $3,
                claimed_by = NULL, claimed_at = NULL, updated_at = $4
            WHERE id = $5
            "#,
        )
        .bind(status.as_str())
        .bind(&error)
        .bind(scheduled_at)
        .bind(now)
        .bind(job_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        debug!(job_id = %job_id, status = status.as_str(), attempts, "Failed job attempt");
        Ok(status)
    }

    /// Dead-letter a job immediately, regardless of remaining attempts.
    /// Used for permanent failures that retrying cannot fix.
    pub async fn dead_letter(&self, job_id: JobId, error: &str) -> Result<()> {
        let error = truncate_message(error, MAX_STORED_ERROR_LEN);
        let result = sqlx::query(
            r#"
            UPDATE study_jobs
            SET status = 'dead', last_error = $1,
                claimed_by = NULL, claimed_at = NULL, updated_at = $2
            WHERE id = $3
            "#,
        )
        .bind(&error)
        .bind(Utc::now())
        .bind(job_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::JobNotFound(job_id));
        }

        debug!(job_id = %job_id, "Dead-lettered job");
        Ok(())
    }

    /// Release running jobs whose claim is older than the lease.
    ///
    /// Covers workers that died mid-job. Jobs with attempts remaining become
    /// claimable again without having their attempt counted twice beyond the
    /// claim that already incremented it; jobs on their final attempt are
    /// dead-lettered, so a job that kills its worker every time cannot cycle
    /// through the queue forever.
    pub async fn release_expired(&self, lease_secs: u64) -> Result<u64> {
        let cutoff = Utc::now() - Duration::seconds(lease_secs as i64);

        let dead = sqlx::query(
            r#"
            UPDATE study_jobs
            SET status = 'dead', last_error = 'claim expired with no attempts remaining',
                claimed_by = NULL, claimed_at = NULL, updated_at = now()
            WHERE status = 'running' AND claimed_at < $1 AND attempts >= max_attempts
            "#,
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await?
        .rows_affected();
        if dead > 0 {
            info!(dead, "Dead-lettered expired claims out of attempts");
        }

        let result = sqlx::query(
            r#"
            UPDATE study_jobs
            SET status = 'pending', claimed_by = NULL, claimed_at = NULL, updated_at = now()
            WHERE status = 'running' AND claimed_at < $1
            "#,
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await?;

        let released = result.rows_affected();
        if released > 0 {
            info!(released, "Released jobs with expired claims");
        }
        Ok(released)
    }

    /// Fetch a job by id
    pub async fn get_job(&self, job_id: JobId) -> Result<Option<StudyJob>> {
        let row: Option<JobRow> = sqlx::query_as(
            r#"
            SELECT id, study_id, filename, kind, status, attempts, max_attempts,
                   last_error, created_at, scheduled_at, updated_at, claimed_by, claimed_at
            FROM study_jobs
            WHERE id = $1
            "#,
        )
        .bind(job_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(JobRow::into_job).transpose()
    }

    /// Count jobs in a given status
    pub async fn count_by_status(&self, status: JobStatus) -> Result<i64> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM study_jobs WHERE status = $1")
                .bind(status.as_str())
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }
}
