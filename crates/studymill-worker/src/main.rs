use clap::Parser;
use std::path::PathBuf;
use studymill_ai::{ChatClient, Pipeline};
use studymill_core::KIND_PROCESS_STUDY;
use studymill_store::Store;
use studymill_worker::handler::StudyHandler;
use studymill_worker::{shutdown_signal, HandlerRegistry, Worker, WorkerConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "studymill-worker")]
#[command(about = "Background worker for AI study material processing", long_about = None)]
struct Args {
    /// Path to a YAML configuration file
    #[arg(long)]
    config: Option<String>,

    /// Postgres connection string
    #[arg(long)]
    database_url: Option<String>,

    /// Directory where uploaded documents are mounted
    #[arg(long)]
    upload_dir: Option<PathBuf>,

    /// Number of concurrent jobs
    #[arg(short, long)]
    concurrency: Option<usize>,

    /// Worker ID (auto-generated if not provided)
    #[arg(long)]
    worker_id: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    // Defaults <- config file <- environment <- CLI flags
    let mut config = match &args.config {
        Some(path) => WorkerConfig::from_file(path)?,
        None => WorkerConfig::default(),
    };
    config.apply_env();
    if let Some(url) = args.database_url {
        config.database_url = url;
    }
    if let Some(dir) = args.upload_dir {
        config.upload_dir = dir;
    }
    if let Some(n) = args.concurrency {
        config.concurrency = n;
    }
    if let Some(id) = args.worker_id {
        config.worker_id = Some(id);
    }

    // Lazy pool: the database may not be up yet, and the worker's own
    // backoff loop handles waiting for it.
    let store = Store::connect_lazy(&config.database_url)?;
    let client = ChatClient::new(config.ai.clone())?;
    let pipeline = Pipeline::new(client);

    let registry = HandlerRegistry::new();
    registry.register(
        KIND_PROCESS_STUDY,
        StudyHandler::new(store.clone(), pipeline, config.upload_dir.clone()),
    );
    tracing::info!("Registered job kinds: {:?}", registry.kinds());

    let worker = Worker::new(config, store, registry);

    // Handle shutdown signals
    let handle = worker.clone_for_task();
    tokio::spawn(async move {
        shutdown_signal().await;
        tracing::info!("Received shutdown signal");
        handle.shutdown();
    });

    worker.run().await
}
