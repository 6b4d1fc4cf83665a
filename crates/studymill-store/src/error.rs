use studymill_core::{JobError, JobId};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("Job not found: {0}")]
    JobNotFound(JobId),

    #[error("Study not found: {0}")]
    StudyNotFound(i64),

    #[error(transparent)]
    Domain(#[from] JobError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;
