use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use studymill_ai::{AiError, Pipeline};
use studymill_core::{validate_payload, StudyJob};
use studymill_store::{Store, StoreError};
use thiserror::Error;
use tracing::{info, warn};

/// Errors from executing a single job
#[derive(Error, Debug)]
pub enum HandlerError {
    #[error("Invalid job: {0}")]
    Invalid(String),

    #[error("File not found on the server: {0}")]
    FileNotFound(String),

    #[error(transparent)]
    Ai(#[from] AiError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Job timed out after {0}s")]
    Timeout(u64),
}

impl HandlerError {
    /// Whether the failure is worth retrying on a later attempt.
    pub fn is_transient(&self) -> bool {
        match self {
            HandlerError::Invalid(_) | HandlerError::FileNotFound(_) => false,
            HandlerError::Ai(e) => e.is_transient(),
            HandlerError::Store(_) | HandlerError::Timeout(_) => true,
        }
    }
}

/// Trait for job handlers
#[async_trait]
pub trait JobHandler: Send + Sync {
    /// Execute the job end to end, including persisting its results.
    async fn run(&self, job: &StudyJob) -> Result<(), HandlerError>;
}

/// Registry of job handlers by job kind
pub struct HandlerRegistry {
    handlers: RwLock<HashMap<String, Arc<dyn JobHandler>>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        HandlerRegistry {
            handlers: RwLock::new(HashMap::new()),
        }
    }

    /// Register a handler for a job kind
    pub fn register<H: JobHandler + 'static>(&self, kind: impl Into<String>, handler: H) {
        self.handlers.write().insert(kind.into(), Arc::new(handler));
    }

    /// Get the handler for a job kind
    pub fn get(&self, kind: &str) -> Option<Arc<dyn JobHandler>> {
        self.handlers.read().get(kind).cloned()
    }

    /// All registered kinds. The worker only claims jobs of these kinds.
    pub fn kinds(&self) -> Vec<String> {
        self.handlers.read().keys().cloned().collect()
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// The study-processing handler: resolves the uploaded file, runs the AI
/// pipeline over it, and persists the study guide and quiz.
pub struct StudyHandler {
    store: Store,
    pipeline: Pipeline,
    upload_dir: PathBuf,
}

impl StudyHandler {
    pub fn new(store: Store, pipeline: Pipeline, upload_dir: PathBuf) -> Self {
        StudyHandler {
            store,
            pipeline,
            upload_dir,
        }
    }
}

#[async_trait]
impl JobHandler for StudyHandler {
    async fn run(&self, job: &StudyJob) -> Result<(), HandlerError> {
        // Re-validated here because the filename is joined onto the upload
        // dir; a job inserted by other means must not escape it.
        validate_payload(job.study_id, &job.filename)
            .map_err(|e| HandlerError::Invalid(e.to_string()))?;

        let path = self.upload_dir.join(&job.filename);
        info!(study_id = job.study_id, path = %path.display(), "Looking for uploaded file");

        if !path.exists() {
            warn!(
                path = %path.display(),
                upload_dir = %self.upload_dir.display(),
                "Uploaded file is missing; check the volume mount"
            );
            return Err(HandlerError::FileNotFound(job.filename.clone()));
        }

        let output = self.pipeline.process(&path).await?;
        self.store.mark_study_ready(job.study_id, &output).await?;
        info!(study_id = job.study_id, "Study saved and ready");

        // The upload is only an input; keep the volume from filling up.
        match tokio::fs::remove_file(&path).await {
            Ok(()) => info!(filename = %job.filename, "Removed uploaded file"),
            Err(e) => warn!(filename = %job.filename, error = %e, "Could not remove uploaded file"),
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use studymill_core::KIND_PROCESS_STUDY;

    struct OkHandler;

    #[async_trait]
    impl JobHandler for OkHandler {
        async fn run(&self, _job: &StudyJob) -> Result<(), HandlerError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_registry() {
        let registry = HandlerRegistry::new();
        registry.register(KIND_PROCESS_STUDY, OkHandler);

        assert!(registry.get(KIND_PROCESS_STUDY).is_some());
        assert!(registry.get("unknown").is_none());
        assert_eq!(registry.kinds(), vec![KIND_PROCESS_STUDY.to_string()]);

        let job = StudyJob::new(1, "notes.txt", KIND_PROCESS_STUDY).unwrap();
        let handler = registry.get(KIND_PROCESS_STUDY).unwrap();
        assert!(handler.run(&job).await.is_ok());
    }

    #[test]
    fn test_error_transience() {
        assert!(!HandlerError::Invalid("bad".into()).is_transient());
        assert!(!HandlerError::FileNotFound("notes.txt".into()).is_transient());
        assert!(HandlerError::Timeout(600).is_transient());
        assert!(!HandlerError::Ai(AiError::MissingApiKey).is_transient());
        assert!(HandlerError::Ai(AiError::Api { status: 503, detail: String::new() }).is_transient());
    }
}
