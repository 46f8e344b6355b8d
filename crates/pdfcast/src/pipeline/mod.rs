pub mod config;
pub mod context;
pub mod progress;
pub mod retry;
pub mod runner;

pub use config::PipelineConfig;
pub use context::JobContext;
pub use progress::{BroadcastProgress, NoopProgress, ProgressReporter};
pub use retry::RetryPolicy;
pub use runner::Orchestrator;
