use crate::handler::{HandlerError, JobHandler};
use std::sync::Arc;
use std::time::Duration;
use studymill_core::StudyJob;
use tokio::time::timeout;
use tracing::{error, info};

/// Job executor with timeout support
pub struct JobExecutor {
    handler: Arc<dyn JobHandler>,
    timeout: Duration,
}

impl JobExecutor {
    pub fn new(handler: Arc<dyn JobHandler>, timeout: Duration) -> Self {
        JobExecutor { handler, timeout }
    }

    /// Execute a job, cutting it off at the configured timeout.
    pub async fn execute(&self, job: &StudyJob) -> Result<(), HandlerError> {
        info!(job_id = %job.id, timeout = ?self.timeout, "Executing job");

        match timeout(self.timeout, self.handler.run(job)).await {
            Ok(Ok(())) => {
                info!(job_id = %job.id, "Job completed successfully");
                Ok(())
            }
            Ok(Err(e)) => {
                error!(job_id = %job.id, error = %e, "Job failed");
                Err(e)
            }
            Err(_) => {
                error!(job_id = %job.id, timeout = ?self.timeout, "Job timed out");
                Err(HandlerError::Timeout(self.timeout.as_secs()))
            }
        }
    }
}
