use thiserror::Error;

#[derive(Error, Debug)]
pub enum JobError {
    #[error("Invalid job payload: {0}")]
    InvalidPayload(String),

    #[error("Invalid quiz: {0}")]
    InvalidQuiz(String),

    #[error("Invalid status value: {0}")]
    InvalidStatus(String),
}

pub type Result<T> = std::result::Result<T, JobError>;
