pub mod broadcast;
pub mod config;
pub mod error;
pub mod ingress;
pub mod job;
pub mod logging;
pub mod pipeline;
pub mod sanitize;
pub mod secrets;
pub mod service;
pub mod stages;
pub mod status;
pub mod storage;
pub mod store;

pub use broadcast::{JobProgressBroadcaster, JobProgressEvent};
pub use config::{load_config, load_config_from_str, Config};
pub use error::{
    ConfigError, IngressError, PdfcastError, Result, StageError, StatusError, StorageError,
    StoreError,
};
pub use ingress::{Document, IngressGateway, UploadPolicy};
pub use job::{ArtifactKind, ArtifactRef, Job, JobFailure, JobId, JobMutation, JobStatus, Stage};
pub use logging::init_logging;
pub use pipeline::{JobContext, Orchestrator, PipelineConfig, ProgressReporter, RetryPolicy};
pub use secrets::{resolve_secret, SecretError};
pub use service::ConversionService;
pub use stages::{StageExecutor, StageSet};
pub use status::{JobStatusView, PollResponse, StatusService};
pub use storage::ArtifactStorage;
pub use store::JobStore;
