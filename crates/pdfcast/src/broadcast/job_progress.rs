//! Push notifications of job snapshots, one event per store commit.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::job::{ArtifactRef, Job, JobFailure, JobId, JobStatus, Stage};

/// Progress event for a job, emitted after each accepted store update.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobProgressEvent {
    pub job_id: JobId,
    pub stage: Stage,
    pub status: JobStatus,
    /// What the pipeline is doing, e.g. "Rendering video...".
    pub message: String,
    pub timestamp: DateTime<Utc>,
    /// Final video (set on completion).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_ref: Option<ArtifactRef>,
    /// Failure details (set on failure).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JobFailure>,
}

impl JobProgressEvent {
    /// Builds an event from a job snapshot.
    pub fn from_job(job: &Job, message: &str) -> Self {
        Self {
            job_id: job.id.clone(),
            stage: job.stage,
            status: job.status,
            message: message.to_string(),
            timestamp: job.updated_at,
            output_ref: job.output_ref.clone(),
            error: job.error.clone(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Fan-out of committed job snapshots to any number of listeners.
#[derive(Clone)]
pub struct JobProgressBroadcaster {
    sender: Arc<broadcast::Sender<JobProgressEvent>>,
}

impl JobProgressBroadcaster {
    /// `capacity` bounds how far a slow listener may lag before it skips events.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Delivers `event` to current listeners; dropped when nobody listens.
    pub fn send(&self, event: JobProgressEvent) {
        let _ = self.sender.send(event);
    }

    /// Publishes the state of a job snapshot.
    pub fn publish(&self, job: &Job, message: &str) {
        self.send(JobProgressEvent::from_job(job, message));
    }

    /// Receives events published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<JobProgressEvent> {
        self.sender.subscribe()
    }

    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for JobProgressBroadcaster {
    fn default() -> Self {
        Self::new(256)
    }
}
