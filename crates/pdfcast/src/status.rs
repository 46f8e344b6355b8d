//! Read-only status queries for polling clients.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::StatusError;
use crate::job::{Job, JobFailure, JobId, JobStatus, Stage};
use crate::storage::ArtifactStorage;
use crate::store::JobStore;

/// Snapshot of one job as seen by a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatusView {
    pub job_id: JobId,
    pub status: JobStatus,
    pub stage: Stage,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JobFailure>,
}

/// Wire shape of a poll answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum PollResponse {
    Processing {
        stage: Stage,
    },
    Completed {
        #[serde(rename = "videoUrl")]
        video_url: String,
    },
    Failed {
        error: JobFailure,
    },
}

impl PollResponse {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PollResponse::Processing { .. })
    }
}

impl From<JobStatusView> for PollResponse {
    fn from(view: JobStatusView) -> Self {
        match (view.status, view.video_url, view.error) {
            (JobStatus::Completed, Some(video_url), _) => PollResponse::Completed { video_url },
            (JobStatus::Failed, _, Some(error)) => PollResponse::Failed { error },
            _ => PollResponse::Processing { stage: view.stage },
        }
    }
}

/// Answers "what is the state of job X" without ever blocking on a running
/// stage. Never writes to the store.
#[derive(Clone)]
pub struct StatusService {
    store: Arc<JobStore>,
    storage: ArtifactStorage,
}

impl StatusService {
    pub fn new(store: Arc<JobStore>, storage: ArtifactStorage) -> Self {
        Self { store, storage }
    }

    fn view(&self, job: &Job) -> JobStatusView {
        // The URL is derived from the id alone so it never changes.
        let video_url = job
            .output_ref
            .as_ref()
            .map(|_| self.storage.public_url(&job.id));
        JobStatusView {
            job_id: job.id.clone(),
            status: job.status,
            stage: job.stage,
            video_url,
            error: job.error.clone(),
        }
    }

    pub fn get_status(&self, job_id: &JobId) -> Result<JobStatusView, StatusError> {
        self.store
            .get(job_id)
            .map(|job| self.view(&job))
            .ok_or_else(|| StatusError::NotFound(job_id.clone()))
    }

    pub fn poll(&self, job_id: &JobId) -> Result<PollResponse, StatusError> {
        self.get_status(job_id).map(PollResponse::from)
    }

    /// Every known job, newest first.
    pub fn list(&self) -> Vec<JobStatusView> {
        self.store.get_all().iter().map(|job| self.view(job)).collect()
    }
}
