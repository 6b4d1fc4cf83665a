use thiserror::Error;

/// Errors from the AI pipeline.
///
/// Display messages stay safe to persist on a study row and show to users;
/// raw upstream detail goes to the log fields instead.
#[derive(Error, Debug)]
pub enum AiError {
    #[error("AI service is not configured")]
    MissingApiKey,

    #[error("Failed to reach the AI service: {0}")]
    Http(#[from] reqwest::Error),

    #[error("AI service is unavailable (status {status})")]
    Unavailable { status: u16, detail: String },

    #[error("AI service rejected the request (status {status})")]
    Api { status: u16, detail: String },

    #[error("Invalid response from the AI service: {0}")]
    InvalidResponse(String),

    #[error("Unsupported document type: {0}")]
    UnsupportedDocument(String),

    #[error("Failed to extract document text: {0}")]
    Extraction(String),

    #[error("Document is empty: {0}")]
    EmptyDocument(String),

    #[error("Failed to read document: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Quiz(#[from] studymill_core::JobError),
}

impl AiError {
    /// Whether retrying the same job later can plausibly succeed.
    ///
    /// Network failures and server-side errors are worth retrying; bad
    /// credentials, bad documents, and rejected requests are not.
    pub fn is_transient(&self) -> bool {
        match self {
            AiError::Http(_) => true,
            AiError::Api { status, .. } => *status >= 500 || *status == 408 || *status == 429,
            AiError::MissingApiKey
            | AiError::Unavailable { .. }
            | AiError::InvalidResponse(_)
            | AiError::UnsupportedDocument(_)
            | AiError::Extraction(_)
            | AiError::EmptyDocument(_)
            | AiError::Io(_)
            | AiError::Quiz(_) => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, AiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transience_classification() {
        assert!(AiError::Api { status: 500, detail: String::new() }.is_transient());
        assert!(AiError::Api { status: 429, detail: String::new() }.is_transient());
        assert!(!AiError::Api { status: 400, detail: String::new() }.is_transient());
        assert!(!AiError::MissingApiKey.is_transient());
        assert!(!AiError::Unavailable { status: 402, detail: String::new() }.is_transient());
        assert!(!AiError::UnsupportedDocument("png".into()).is_transient());
        assert!(!AiError::Extraction("broken xref table".into()).is_transient());
    }
}
