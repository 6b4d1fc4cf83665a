mod error;
mod job;
mod study;

pub use error::{JobError, Result};
pub use job::{
    retry_delay_seconds, validate_payload, JobId, JobStatus, StudyJob, DEFAULT_MAX_ATTEMPTS,
    KIND_PROCESS_STUDY,
};
pub use study::{truncate_message, Quiz, QuizQuestion, StudyOutput, StudyStatus};

/// Maximum length of an error message persisted on a study or a job.
pub const MAX_STORED_ERROR_LEN: usize = 1000;
