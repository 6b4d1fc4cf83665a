pub mod config;
pub mod executor;
pub mod handler;
pub mod worker;

pub use config::WorkerConfig;
pub use handler::{HandlerError, HandlerRegistry, JobHandler, StudyHandler};
pub use worker::{shutdown_signal, Worker};
