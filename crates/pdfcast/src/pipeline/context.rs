use std::path::{Path, PathBuf};

use crate::job::{ArtifactKind, ArtifactRef, Job, JobId};

/// Read-only view of a job handed to a stage executor.
///
/// Executors receive this instead of the job record so they cannot reach the
/// store; all state changes go through the orchestrator.
#[derive(Debug, Clone)]
pub struct JobContext {
    pub job_id: JobId,
    /// Scratch directory owned by this job; intermediates go here.
    pub work_dir: PathBuf,
    /// Where the final stage must write the video.
    pub video_path: PathBuf,
    /// 1-based attempt number of the current stage invocation.
    pub attempt: u32,
    /// Artifacts produced before the current stage, original document first.
    pub artifacts: Vec<ArtifactRef>,
}

impl JobContext {
    pub fn new(job: &Job, work_dir: &Path, video_path: &Path, attempt: u32) -> Self {
        let mut artifacts = Vec::with_capacity(job.artifacts.len() + 1);
        artifacts.push(job.input_ref.clone());
        artifacts.extend(job.artifacts.iter().cloned());

        Self {
            job_id: job.id.clone(),
            work_dir: work_dir.to_path_buf(),
            video_path: video_path.to_path_buf(),
            attempt,
            artifacts,
        }
    }

    pub fn artifact(&self, kind: ArtifactKind) -> Option<&ArtifactRef> {
        self.artifacts.iter().find(|a| a.kind == kind)
    }

    /// Path of a named file inside the job's scratch directory.
    pub fn work_file(&self, name: &str) -> PathBuf {
        self.work_dir.join(name)
    }
}
