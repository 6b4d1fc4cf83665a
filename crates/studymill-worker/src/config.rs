use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use studymill_ai::ChatConfig;

/// Worker configuration.
///
/// Precedence, lowest to highest: built-in defaults, YAML config file,
/// environment variables, CLI flags. The binary must start with no
/// arguments, so every field has a working default.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Postgres connection string
    pub database_url: String,

    /// Directory where the web tier's uploads are mounted
    pub upload_dir: PathBuf,

    /// Worker ID (auto-generated if not provided)
    pub worker_id: Option<String>,

    /// Maximum jobs processed at once. 1 keeps a single model call in
    /// flight at a time, the original prefetch behavior.
    pub concurrency: usize,

    /// Idle poll interval bounds; polling backs off towards the max while
    /// the queue is empty and resets when a job is found
    pub poll_min_interval_ms: u64,
    pub poll_max_interval_ms: u64,

    /// Hard cap on a single job's execution time
    pub job_timeout_secs: u64,

    /// Claims older than this are presumed abandoned and released
    pub claim_lease_secs: u64,

    /// How often to sweep for abandoned claims
    pub sweep_interval_secs: u64,

    /// How long to wait for in-flight jobs on shutdown
    pub graceful_shutdown_timeout_secs: u64,

    /// AI service settings
    pub ai: ChatConfig,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        WorkerConfig {
            database_url: "postgres://localhost:5432/studymill".to_string(),
            upload_dir: PathBuf::from("app/static/uploads"),
            worker_id: None,
            concurrency: 1,
            poll_min_interval_ms: 500,
            poll_max_interval_ms: 5000,
            job_timeout_secs: 600,
            claim_lease_secs: 900,
            sweep_interval_secs: 60,
            graceful_shutdown_timeout_secs: 60,
            ai: ChatConfig::default(),
        }
    }
}

impl WorkerConfig {
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: WorkerConfig = serde_yaml::from_str(&contents)?;
        Ok(config)
    }

    /// Overlay environment variables onto the config.
    pub fn apply_env(&mut self) {
        if let Ok(url) = std::env::var("DATABASE_URL") {
            self.database_url = url;
        }
        if let Ok(dir) = std::env::var("UPLOAD_DIR") {
            self.upload_dir = PathBuf::from(dir);
        }
        if let Ok(id) = std::env::var("WORKER_ID") {
            self.worker_id = Some(id);
        }
        if let Ok(n) = std::env::var("WORKER_CONCURRENCY") {
            if let Ok(n) = n.parse() {
                self.concurrency = n;
            }
        }
        if let Ok(key) = std::env::var("DEEPSEEK_API_KEY") {
            self.ai.api_key = Some(key);
        }
        if let Ok(endpoint) = std::env::var("DEEPSEEK_ENDPOINT") {
            self.ai.endpoint = endpoint;
        }
        if let Ok(model) = std::env::var("AI_MODEL") {
            self.ai.model = model;
        }
        if let Ok(secs) = std::env::var("AI_TIMEOUT_SECONDS") {
            if let Ok(secs) = secs.parse() {
                self.ai.timeout_secs = secs;
            }
        }
        if let Ok(tokens) = std::env::var("AI_MAX_TOKENS") {
            if let Ok(tokens) = tokens.parse() {
                self.ai.max_tokens = tokens;
            }
        }
    }

    /// Resolve the worker id, generating a stable-enough unique one from
    /// hostname, pid, and a random suffix when none is configured.
    pub fn generate_worker_id(&self) -> String {
        if let Some(id) = &self.worker_id {
            return id.clone();
        }

        let host = hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .unwrap_or_else(|| "unknown".to_string());
        let pid = std::process::id();
        let suffix = uuid::Uuid::new_v4().simple().to_string();

        format!("{}-{}-{}", host, pid, &suffix[..8])
    }
}
