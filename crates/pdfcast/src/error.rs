use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::job::JobId;
use crate::secrets::SecretError;

#[derive(Error, Debug)]
pub enum PdfcastError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Submission rejected: {0}")]
    Ingress(#[from] IngressError),

    #[error("Status query failed: {0}")]
    Status(#[from] StatusError),

    #[error("Job store error: {0}")]
    Store(#[from] StoreError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Schema validation failed: {errors}")]
    SchemaValidation { errors: String },

    #[error("Secret '{name}' could not be resolved: {source}")]
    Secret {
        name: String,
        #[source]
        source: SecretError,
    },

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(String),
}

#[derive(Error, Debug)]
pub enum IngressError {
    #[error("Invalid input: {reason}")]
    InvalidInput { reason: String },

    #[error("Failed to store upload: {0}")]
    Storage(#[from] StorageError),

    #[error("Failed to register job: {0}")]
    Store(#[from] StoreError),
}

impl IngressError {
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            reason: reason.into(),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StatusError {
    #[error("Job not found: {0}")]
    NotFound(JobId),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Job {0} already exists")]
    DuplicateJob(JobId),

    /// Raised only by orchestration bugs: updating a record that was never
    /// created, or applying a transition the state machine forbids.
    #[error("Internal inconsistency for job {job_id}: {reason}")]
    InternalInconsistency { job_id: JobId, reason: String },
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to create directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file '{path}': {source}")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to remove '{path}': {source}")]
    Remove {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failure reported by a stage executor. Carries enough detail for the
/// orchestrator to populate the job's error field.
#[derive(Error, Debug)]
pub enum StageError {
    #[error("Invalid input artifact: {0}")]
    InvalidInput(String),

    #[error("Failed to read artifact '{path}': {source}")]
    ReadArtifact {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write artifact '{path}': {source}")]
    WriteArtifact {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to process PDF: {0}")]
    PdfProcessing(String),

    #[error("Remote service error: {0}")]
    Remote(String),

    #[error("External tool '{tool}' failed: {message}")]
    Tool { tool: String, message: String },

    #[error("Stage timed out after {0:?}")]
    Timeout(Duration),

    #[error("Stage executor panicked: {0}")]
    Panicked(String),
}

impl StageError {
    /// Errors worth another attempt under a retry policy.
    pub fn is_transient(&self) -> bool {
        matches!(self, StageError::Remote(_) | StageError::Timeout(_))
    }
}

impl From<reqwest::Error> for StageError {
    fn from(err: reqwest::Error) -> Self {
        StageError::Remote(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PdfcastError>;
