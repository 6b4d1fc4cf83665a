use crate::{JobError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a queued job
pub type JobId = Uuid;

/// Job kind handled by the study processing pipeline
pub const KIND_PROCESS_STUDY: &str = "process_study";

/// Default number of attempts before a job is dead-lettered
pub const DEFAULT_MAX_ATTEMPTS: i32 = 3;

/// Job status in the queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobStatus {
    /// Job is waiting to be claimed by a worker
    Pending,
    /// Job is currently being processed by a worker
    Running,
    /// Job completed successfully
    Completed,
    /// Job failed and is scheduled for another attempt
    Failed,
    /// Job exhausted its attempts or failed permanently
    Dead,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Dead => "dead",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "running" => Ok(JobStatus::Running),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            "dead" => Ok(JobStatus::Dead),
            other => Err(JobError::InvalidStatus(other.to_string())),
        }
    }
}

/// A queued study-processing job with all of its queue metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudyJob {
    /// Unique job identifier
    pub id: JobId,

    /// The study this job belongs to
    pub study_id: i64,

    /// Name of the uploaded file, relative to the worker's upload directory
    pub filename: String,

    /// Job kind (e.g. [`KIND_PROCESS_STUDY`])
    pub kind: String,

    /// Current status
    pub status: JobStatus,

    /// Number of attempts made so far (incremented on claim)
    pub attempts: i32,

    /// Maximum number of attempts before dead-lettering
    pub max_attempts: i32,

    /// Error message from the most recent failed attempt
    pub last_error: Option<String>,

    /// When the job was created
    pub created_at: DateTime<Utc>,

    /// When the job becomes due (pushed into the future on retry)
    pub scheduled_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,

    /// Worker currently processing this job (if running)
    pub claimed_by: Option<String>,

    /// When the current claim was taken
    pub claimed_at: Option<DateTime<Utc>>,
}

impl StudyJob {
    /// Create a new pending job after validating its payload
    pub fn new(study_id: i64, filename: impl Into<String>, kind: impl Into<String>) -> Result<Self> {
        let filename = filename.into();
        validate_payload(study_id, &filename)?;

        let now = Utc::now();
        Ok(StudyJob {
            id: Uuid::new_v4(),
            study_id,
            filename,
            kind: kind.into(),
            status: JobStatus::Pending,
            attempts: 0,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            last_error: None,
            created_at: now,
            scheduled_at: now,
            updated_at: now,
            claimed_by: None,
            claimed_at: None,
        })
    }

    /// Check if the job has attempts left after a failure
    pub fn can_retry(&self) -> bool {
        self.attempts < self.max_attempts
    }

    /// Check if the job is due for execution
    pub fn is_due(&self) -> bool {
        self.scheduled_at <= Utc::now()
    }

    /// Calculate the retry delay for the current attempt using exponential backoff
    pub fn retry_delay_seconds(&self) -> u64 {
        retry_delay_seconds(self.attempts)
    }
}

const RETRY_BASE_DELAY_SECS: u64 = 5;
const RETRY_MAX_DELAY_SECS: u64 = 3600;

/// Exponential retry delay for a job that has made `attempts` attempts.
/// Grows 5s, 10s, 20s, ... and is capped at one hour.
pub fn retry_delay_seconds(attempts: i32) -> u64 {
    let exponent = attempts.saturating_sub(1).max(0).min(30) as u32;
    let delay = RETRY_BASE_DELAY_SECS.saturating_mul(2u64.saturating_pow(exponent));
    delay.min(RETRY_MAX_DELAY_SECS)
}

/// Validate a job payload before it is accepted into the queue.
///
/// The filename is later joined under the worker's upload directory, so it
/// must be a bare file name: no separators, no parent-directory components.
pub fn validate_payload(study_id: i64, filename: &str) -> Result<()> {
    if study_id <= 0 {
        return Err(JobError::InvalidPayload(format!(
            "study_id must be positive (got {study_id})"
        )));
    }
    if filename.is_empty() {
        return Err(JobError::InvalidPayload("filename is empty".to_string()));
    }
    if filename.contains('/') || filename.contains('\\') {
        return Err(JobError::InvalidPayload(format!(
            "filename must not contain path separators: {filename}"
        )));
    }
    if filename == "." || filename == ".." {
        return Err(JobError::InvalidPayload(format!(
            "filename must not be a directory reference: {filename}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_creation() {
        let job = StudyJob::new(42, "notes.txt", KIND_PROCESS_STUDY).unwrap();

        assert_eq!(job.study_id, 42);
        assert_eq!(job.filename, "notes.txt");
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.attempts, 0);
        assert_eq!(job.max_attempts, DEFAULT_MAX_ATTEMPTS);
        assert!(job.is_due());
    }

    #[test]
    fn test_payload_validation() {
        assert!(StudyJob::new(0, "notes.txt", KIND_PROCESS_STUDY).is_err());
        assert!(StudyJob::new(1, "", KIND_PROCESS_STUDY).is_err());
        assert!(StudyJob::new(1, "../etc/passwd", KIND_PROCESS_STUDY).is_err());
        assert!(StudyJob::new(1, "a/b.txt", KIND_PROCESS_STUDY).is_err());
        assert!(StudyJob::new(1, "a\\b.txt", KIND_PROCESS_STUDY).is_err());
        assert!(StudyJob::new(1, "..", KIND_PROCESS_STUDY).is_err());
        // A leading dot on a regular hidden file is fine
        assert!(StudyJob::new(1, ".notes.txt", KIND_PROCESS_STUDY).is_ok());
    }

    #[test]
    fn test_retry_delay() {
        assert_eq!(retry_delay_seconds(1), 5); // 5 * 2^0
        assert_eq!(retry_delay_seconds(2), 10); // 5 * 2^1
        assert_eq!(retry_delay_seconds(3), 20); // 5 * 2^2
        assert_eq!(retry_delay_seconds(12), 3600); // capped at 1 hour
        assert_eq!(retry_delay_seconds(0), 5);
    }

    #[test]
    fn test_can_retry() {
        let mut job = StudyJob::new(1, "notes.txt", KIND_PROCESS_STUDY).unwrap();
        assert!(job.can_retry());
        job.attempts = job.max_attempts;
        assert!(!job.can_retry());
    }

    #[test]
    fn test_status_roundtrip() {
        for status in [
            JobStatus::Pending,
            JobStatus::Running,
            JobStatus::Completed,
            JobStatus::Failed,
            JobStatus::Dead,
        ] {
            assert_eq!(JobStatus::parse(status.as_str()).unwrap(), status);
        }
        assert!(JobStatus::parse("bogus").is_err());
    }
}
