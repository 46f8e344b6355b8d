//! Top-level wiring of the conversion pipeline.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{info, warn};
use tokio::sync::broadcast;

use crate::broadcast::{JobProgressBroadcaster, JobProgressEvent};
use crate::config::Config;
use crate::error::Result;
use crate::ingress::{Document, IngressGateway, UploadPolicy};
use crate::job::JobId;
use crate::pipeline::{BroadcastProgress, Orchestrator, PipelineConfig, ProgressReporter};
use crate::stages::StageSet;
use crate::status::{JobStatusView, PollResponse, StatusService};
use crate::storage::ArtifactStorage;
use crate::store::{JobCounts, JobStore};

/// One running instance of the service: a job store shared by the
/// ingress gateway, the orchestrator and the status service.
///
/// Must be created inside a Tokio runtime; submissions spawn tasks.
pub struct ConversionService {
    store: Arc<JobStore>,
    storage: ArtifactStorage,
    broadcaster: JobProgressBroadcaster,
    gateway: IngressGateway,
    status: StatusService,
    retention: Option<Duration>,
}

impl ConversionService {
    /// Builds the production service. Fails on a missing API key or an
    /// unwritable storage directory before any job is accepted.
    pub fn from_config(config: &Config) -> Result<Self> {
        let stages = StageSet::from_config(config)?;
        Self::with_stages(config, stages)
    }

    /// Builds the service around the given executors.
    pub fn with_stages(config: &Config, stages: StageSet) -> Result<Self> {
        let storage = ArtifactStorage::new(
            config.upload_dir(),
            config.work_dir(),
            config.output_dir(),
            &config.video_base_url,
        );
        storage.ensure_directories()?;

        let store = Arc::new(JobStore::new());
        let broadcaster = JobProgressBroadcaster::default();
        let progress: Arc<dyn ProgressReporter> =
            Arc::new(BroadcastProgress::new(broadcaster.clone()));

        let orchestrator = Orchestrator::new(
            Arc::clone(&store),
            stages,
            storage.clone(),
            Arc::clone(&progress),
            PipelineConfig::from_config(config),
        );
        let gateway = IngressGateway::new(
            Arc::clone(&store),
            storage.clone(),
            orchestrator,
            progress,
            UploadPolicy::from_config(config),
        );
        let status = StatusService::new(Arc::clone(&store), storage.clone());

        info!(
            "Conversion service ready (videos under {})",
            storage.output_directory().display()
        );

        Ok(Self {
            store,
            storage,
            broadcaster,
            gateway,
            status,
            retention: config.retention_secs.map(Duration::from_secs),
        })
    }

    pub async fn submit(&self, document: Document) -> Result<JobId> {
        Ok(self.gateway.submit(document).await?)
    }

    pub fn get_status(&self, job_id: &JobId) -> Result<JobStatusView> {
        Ok(self.status.get_status(job_id)?)
    }

    pub fn poll(&self, job_id: &JobId) -> Result<PollResponse> {
        Ok(self.status.poll(job_id)?)
    }

    pub fn list(&self) -> Vec<JobStatusView> {
        self.status.list()
    }

    pub fn counts(&self) -> JobCounts {
        self.store.counts()
    }

    /// Stream of every job snapshot the pipeline commits, in commit order.
    pub fn subscribe(&self) -> broadcast::Receiver<JobProgressEvent> {
        self.broadcaster.subscribe()
    }

    pub fn status_service(&self) -> &StatusService {
        &self.status
    }

    /// Drops finished jobs older than the configured retention and deletes
    /// their files. Returns how many jobs were removed.
    pub async fn purge_expired(&self) -> usize {
        match self.retention {
            Some(retention) => self.purge_older_than(retention).await,
            None => 0,
        }
    }

    pub async fn purge_older_than(&self, age: Duration) -> usize {
        let cutoff = chrono::Duration::from_std(age)
            .ok()
            .and_then(|age| Utc::now().checked_sub_signed(age))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);

        let removed = self.store.purge_finished_before(cutoff);
        for job in &removed {
            if let Err(e) = self.storage.remove_job_artifacts(job).await {
                warn!("Failed to remove artifacts of job {}: {}", job.id, e);
            }
        }
        removed.len()
    }
}
