use crate::config::WorkerConfig;
use crate::executor::JobExecutor;
use crate::handler::{HandlerError, HandlerRegistry};

use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use studymill_core::{JobStatus, StudyJob};
use studymill_store::Store;
use tokio::sync::Notify;
use tracing::{error, info, warn};

/// Backoff on queue/database errors, matching the original reconnect loop:
/// 2s per consecutive failure, capped at 30s.
const CONNECT_BACKOFF_STEP_SECS: u64 = 2;
const CONNECT_BACKOFF_MAX_SECS: u64 = 30;

/// Linear backoff after `failures` consecutive connection failures
fn connect_backoff(failures: u64) -> Duration {
    Duration::from_secs((CONNECT_BACKOFF_STEP_SECS * failures).min(CONNECT_BACKOFF_MAX_SECS))
}

/// Resolve when the process receives SIGINT or SIGTERM.
///
/// Container runtimes stop with SIGTERM, so ctrl-c alone would skip the
/// graceful drain in the normal deployment.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.ok();
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(_) => std::future::pending().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

/// Long-running worker process: claims jobs from the queue and executes
/// them through the handler registry.
pub struct Worker {
    config: WorkerConfig,
    worker_id: String,
    store: Store,
    registry: Arc<HandlerRegistry>,
    active_jobs: Arc<RwLock<usize>>,
    shutdown: Arc<Notify>,
}

impl Worker {
    pub fn new(config: WorkerConfig, store: Store, registry: HandlerRegistry) -> Self {
        let worker_id = config.generate_worker_id();

        Worker {
            config,
            worker_id,
            store,
            registry: Arc::new(registry),
            active_jobs: Arc::new(RwLock::new(0)),
            shutdown: Arc::new(Notify::new()),
        }
    }

    /// Run the worker until shutdown is requested.
    pub async fn run(&self) -> anyhow::Result<()> {
        info!(
            worker_id = %self.worker_id,
            concurrency = self.config.concurrency,
            "Starting worker"
        );

        // Verify the database before consuming anything. The database may
        // still be coming up when the worker starts, so this retries with
        // the reconnect backoff instead of exiting.
        let mut migrate_failures: u64 = 0;
        loop {
            match self.store.migrate().await {
                Ok(()) => break,
                Err(e) => {
                    migrate_failures += 1;
                    let backoff = connect_backoff(migrate_failures);
                    warn!(
                        error = %e,
                        attempt = migrate_failures,
                        backoff_secs = backoff.as_secs(),
                        "Database not ready; retrying"
                    );
                    tokio::select! {
                        _ = self.shutdown.notified() => {
                            info!("Worker shutting down before the database became ready");
                            return Ok(());
                        }
                        _ = tokio::time::sleep(backoff) => {}
                    }
                }
            }
        }

        let kinds = self.registry.kinds();
        if kinds.is_empty() {
            anyhow::bail!("no job handlers registered");
        }
        info!(?kinds, "Waiting for jobs");

        let mut poll_interval = Duration::from_millis(self.config.poll_min_interval_ms);
        let poll_max = Duration::from_millis(self.config.poll_max_interval_ms);
        let mut connect_failures: u64 = 0;

        let mut sweep = tokio::time::interval(Duration::from_secs(self.config.sweep_interval_secs));
        sweep.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = self.shutdown.notified() => {
                    info!("Worker shutting down gracefully");
                    self.drain().await;
                    break;
                }

                _ = sweep.tick() => {
                    if let Err(e) = self.store.release_expired(self.config.claim_lease_secs).await {
                        warn!(error = %e, "Failed to sweep expired claims");
                    }
                }

                _ = tokio::time::sleep(poll_interval) => {
                    if *self.active_jobs.read() >= self.config.concurrency {
                        continue;
                    }

                    match self.store.claim_next(&self.worker_id, &kinds).await {
                        Ok(Some(job)) => {
                            connect_failures = 0;
                            poll_interval = Duration::from_millis(self.config.poll_min_interval_ms);

                            // Counted before the spawn so the next poll sees
                            // the claimed job against the concurrency cap
                            {
                                let mut active = self.active_jobs.write();
                                *active += 1;
                            }
                            let worker = self.clone_for_task();
                            tokio::spawn(async move {
                                worker.execute_job(job).await;
                            });
                        }
                        Ok(None) => {
                            connect_failures = 0;
                            // Queue is idle; back off up to the cap
                            poll_interval = (poll_interval * 2).min(poll_max);
                        }
                        Err(e) => {
                            connect_failures += 1;
                            let backoff = connect_backoff(connect_failures);
                            warn!(
                                error = %e,
                                attempt = connect_failures,
                                backoff_secs = backoff.as_secs(),
                                "Failed to reach the queue; backing off"
                            );
                            poll_interval = backoff;
                        }
                    }
                }
            }
        }

        Ok(())
    }

    /// Execute a claimed job and record its outcome. The caller has already
    /// counted the job in `active_jobs`; this only releases the slot.
    async fn execute_job(&self, job: StudyJob) {
        info!(
            job_id = %job.id,
            study_id = job.study_id,
            filename = %job.filename,
            attempt = job.attempts,
            "Received job"
        );

        let result = match self.registry.get(&job.kind) {
            Some(handler) => {
                let executor =
                    JobExecutor::new(handler, Duration::from_secs(self.config.job_timeout_secs));
                executor.execute(&job).await
            }
            None => Err(HandlerError::Invalid(format!(
                "no handler registered for job kind: {}",
                job.kind
            ))),
        };

        match result {
            Ok(()) => {
                if let Err(e) = self.store.complete(job.id).await {
                    error!(job_id = %job.id, error = %e, "Failed to mark job completed");
                } else {
                    info!(job_id = %job.id, study_id = job.study_id, "Job finished");
                }
            }
            Err(err) => self.record_failure(&job, err).await,
        }

        let mut active = self.active_jobs.write();
        *active = active.saturating_sub(1);
    }

    /// Record a failed attempt: transient errors go back to the queue with
    /// a retry delay, permanent ones are dead-lettered. The study row is
    /// only marked failed once the job will not run again.
    async fn record_failure(&self, job: &StudyJob, err: HandlerError) {
        let message = err.to_string();

        let outcome = if err.is_transient() {
            self.store.fail(job.id, &message).await
        } else {
            self.store.dead_letter(job.id, &message).await.map(|_| JobStatus::Dead)
        };

        match outcome {
            Ok(JobStatus::Dead) => {
                error!(
                    job_id = %job.id,
                    study_id = job.study_id,
                    error = %message,
                    "Job dead-lettered"
                );
                if let Err(e) = self.store.mark_study_failed(job.study_id, &message).await {
                    error!(study_id = job.study_id, error = %e, "Failed to update study status");
                }
            }
            Ok(_) => {
                warn!(
                    job_id = %job.id,
                    attempt = job.attempts,
                    retry_in_secs = job.retry_delay_seconds(),
                    error = %message,
                    "Job attempt failed; retry scheduled"
                );
            }
            Err(e) => {
                error!(job_id = %job.id, error = %e, "Failed to record job failure");
            }
        }
    }

    /// Wait for in-flight jobs to finish, up to the shutdown deadline.
    async fn drain(&self) {
        info!("Waiting for active jobs to complete");

        let deadline = tokio::time::Instant::now()
            + Duration::from_secs(self.config.graceful_shutdown_timeout_secs);

        loop {
            let active = *self.active_jobs.read();
            if active == 0 {
                info!("All jobs completed, shutting down");
                break;
            }
            if tokio::time::Instant::now() > deadline {
                warn!(active, "Shutdown deadline exceeded with jobs still active");
                break;
            }
            tokio::time::sleep(Duration::from_millis(500)).await;
        }
    }

    /// Clone handles for a spawned task or signal listener
    pub fn clone_for_task(&self) -> Self {
        Worker {
            config: self.config.clone(),
            worker_id: self.worker_id.clone(),
            store: self.store.clone(),
            registry: self.registry.clone(),
            active_jobs: self.active_jobs.clone(),
            shutdown: self.shutdown.clone(),
        }
    }

    /// Trigger graceful shutdown
    pub fn shutdown(&self) {
        self.shutdown.notify_waiters();
    }

    pub fn worker_id(&self) -> &str {
        &self.worker_id
    }
}
