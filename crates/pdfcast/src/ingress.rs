//! Ingress gateway: validates an upload, registers the job and hands it to
//! the orchestrator without waiting for the conversion.

use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};

use crate::config::Config;
use crate::error::IngressError;
use crate::job::{ArtifactKind, ArtifactRef, Job, JobId};
use crate::pipeline::{Orchestrator, ProgressReporter};
use crate::storage::ArtifactStorage;
use crate::store::JobStore;

const PDF_MAGIC: &[u8; 4] = b"%PDF";
const PDF_CONTENT_TYPE: &str = "application/pdf";

/// An uploaded document as received from the transport layer.
#[derive(Debug, Clone)]
pub struct Document {
    pub bytes: Vec<u8>,
    /// Declared content type, e.g. `application/pdf`.
    pub content_type: String,
    /// Original client-side file name, informational only.
    pub filename: Option<String>,
}

impl Document {
    pub fn new(bytes: Vec<u8>, content_type: impl Into<String>) -> Self {
        Self {
            bytes,
            content_type: content_type.into(),
            filename: None,
        }
    }

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    /// Reads a local file, guessing its content type from the extension.
    pub fn from_path(path: &Path) -> Result<Self, IngressError> {
        let bytes = std::fs::read(path).map_err(|e| {
            IngressError::invalid(format!("Cannot read '{}': {}", path.display(), e))
        })?;
        let content_type = mime_guess::from_path(path)
            .first_or_octet_stream()
            .essence_str()
            .to_string();
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string);

        Ok(Self {
            bytes,
            content_type,
            filename,
        })
    }

    /// The media type without parameters, lowercased.
    pub fn essence(&self) -> String {
        self.content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase()
    }
}

/// What a submission must satisfy before a job is created.
#[derive(Debug, Clone)]
pub struct UploadPolicy {
    pub max_bytes: u64,
    pub accepted_content_types: Vec<String>,
}

impl UploadPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_bytes: config.max_upload_bytes,
            accepted_content_types: config
                .accepted_content_types
                .iter()
                .map(|t| t.trim().to_ascii_lowercase())
                .collect(),
        }
    }

    pub fn validate(&self, document: &Document) -> Result<(), IngressError> {
        let essence = document.essence();
        if !self.accepted_content_types.iter().any(|t| *t == essence) {
            return Err(IngressError::invalid(format!(
                "Unsupported content type '{}' (accepted: {})",
                document.content_type,
                self.accepted_content_types.join(", ")
            )));
        }

        if document.bytes.is_empty() {
            return Err(IngressError::invalid("Document is empty"));
        }

        if document.bytes.len() as u64 > self.max_bytes {
            return Err(IngressError::invalid(format!(
                "Document is {} bytes, the limit is {} bytes",
                document.bytes.len(),
                self.max_bytes
            )));
        }

        if essence == PDF_CONTENT_TYPE && !document.bytes.starts_with(PDF_MAGIC) {
            return Err(IngressError::invalid(
                "Document does not start with the %PDF signature",
            ));
        }

        Ok(())
    }
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self {
            max_bytes: 10 * 1024 * 1024,
            accepted_content_types: vec![PDF_CONTENT_TYPE.to_string()],
        }
    }
}

pub struct IngressGateway {
    store: Arc<JobStore>,
    storage: ArtifactStorage,
    orchestrator: Orchestrator,
    progress: Arc<dyn ProgressReporter>,
    policy: UploadPolicy,
}

impl IngressGateway {
    pub fn new(
        store: Arc<JobStore>,
        storage: ArtifactStorage,
        orchestrator: Orchestrator,
        progress: Arc<dyn ProgressReporter>,
        policy: UploadPolicy,
    ) -> Self {
        Self {
            store,
            storage,
            orchestrator,
            progress,
            policy,
        }
    }

    /// Accepts a document and returns the new job's identifier as soon as
    /// the job is registered. Invalid documents never create a job.
    pub async fn submit(&self, document: Document) -> Result<JobId, IngressError> {
        if let Err(e) = self.policy.validate(&document) {
            warn!(
                content_type = %document.content_type,
                bytes = document.bytes.len(),
                error = %e,
                "Rejected upload"
            );
            return Err(e);
        }

        let job_id = JobId::new();
        let upload = self.storage.store_upload(&job_id, &document.bytes).await?;
        let job = Job::new(
            job_id.clone(),
            ArtifactRef::from_path(ArtifactKind::Document, &upload),
        )
        .with_upload_info(document.filename.clone(), &document.essence());

        let job = match self.store.insert(job) {
            Ok(job) => job,
            Err(e) => {
                if let Err(cleanup) = tokio::fs::remove_file(&upload).await {
                    warn!(error = %cleanup, "Failed to remove orphaned upload");
                }
                return Err(e.into());
            }
        };
        self.progress.report(&job, "Job queued for processing");

        // Detached; results are read from the store.
        drop(self.orchestrator.enqueue(job_id.clone()));

        info!(
            job_id = %job_id,
            bytes = document.bytes.len(),
            filename = document.filename.as_deref().unwrap_or("unknown"),
            "Accepted document"
        );
        Ok(job_id)
    }
}
