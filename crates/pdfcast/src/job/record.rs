use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::artifact::ArtifactRef;
use super::stage::{JobStatus, Stage};

/// Opaque, collision-free job identifier (UUID v4 text).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Accepts any non-empty identifier. Unknown ids are resolved by the
    /// store, not rejected here.
    pub fn parse(value: &str) -> Option<Self> {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&str> for JobId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for JobId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Why a job stopped: the stage that failed and a human-readable reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobFailure {
    pub stage: Stage,
    pub message: String,
}

impl JobFailure {
    pub fn new(stage: Stage, message: impl Into<String>) -> Self {
        Self {
            stage,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for JobFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} failed: {}", self.stage, self.message)
    }
}

/// A stage-transition change applied atomically by the job store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobMutation {
    StageStarted(Stage),
    StageSucceeded { stage: Stage, artifact: ArtifactRef },
    Failed(JobFailure),
}

impl JobMutation {
    pub fn stage(&self) -> Stage {
        match self {
            JobMutation::StageStarted(stage) => *stage,
            JobMutation::StageSucceeded { stage, .. } => *stage,
            JobMutation::Failed(failure) => failure.stage,
        }
    }
}

/// Lifecycle state of one submitted document.
///
/// `output_ref` is `Some` exactly when the status is `Completed` and `error`
/// is `Some` exactly when the status is `Failed`. Both are only ever set by
/// [`Job::apply`], which keeps `stage` non-decreasing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: JobId,
    pub stage: Stage,
    pub status: JobStatus,
    pub input_ref: ArtifactRef,
    /// Most recent artifact; the input of the next stage.
    pub working_ref: ArtifactRef,
    /// Every artifact produced so far, in stage order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub artifacts: Vec<ArtifactRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_ref: Option<ArtifactRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JobFailure>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    /// Number of times a stage executor has been invoked for this job.
    pub attempts: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// A freshly submitted job: pending at the first stage.
    pub fn new(id: JobId, input_ref: ArtifactRef) -> Self {
        let now = Utc::now();
        Self {
            id,
            stage: Stage::first(),
            status: JobStatus::Pending,
            working_ref: input_ref.clone(),
            input_ref,
            artifacts: Vec::new(),
            output_ref: None,
            error: None,
            filename: None,
            content_type: None,
            attempts: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Records what the client declared about the upload.
    pub fn with_upload_info(mut self, filename: Option<String>, content_type: &str) -> Self {
        self.filename = filename;
        self.content_type = Some(content_type.to_string());
        self
    }

    pub fn is_finished(&self) -> bool {
        self.status.is_terminal()
    }

    /// The artifact of the given kind produced by an earlier stage, if any.
    pub fn artifact(&self, kind: super::ArtifactKind) -> Option<&ArtifactRef> {
        if self.input_ref.kind == kind {
            return Some(&self.input_ref);
        }
        self.artifacts.iter().find(|a| a.kind == kind)
    }

    /// Applies a transition, rejecting any that would break the lifecycle
    /// invariants. On error the job is left untouched.
    pub fn apply(&mut self, mutation: JobMutation) -> Result<(), String> {
        if self.status.is_terminal() {
            return Err(format!(
                "job is already {} and cannot accept {:?}",
                self.status, mutation
            ));
        }

        match mutation {
            JobMutation::StageStarted(stage) => {
                if stage != self.stage {
                    return Err(format!(
                        "cannot start {} while the job is at {}",
                        stage, self.stage
                    ));
                }
                self.status = JobStatus::Running;
                self.attempts += 1;
            }
            JobMutation::StageSucceeded { stage, artifact } => {
                if self.status != JobStatus::Running {
                    return Err(format!("{} succeeded but the job is {}", stage, self.status));
                }
                if stage != self.stage {
                    return Err(format!(
                        "{} succeeded while the job is at {}",
                        stage, self.stage
                    ));
                }
                if artifact.kind != stage.output_kind() {
                    return Err(format!(
                        "{} must produce {} but produced {}",
                        stage,
                        stage.output_kind(),
                        artifact.kind
                    ));
                }

                self.artifacts.push(artifact.clone());
                self.working_ref = artifact.clone();
                match stage.next() {
                    Some(next) => self.stage = next,
                    None => {
                        self.output_ref = Some(artifact);
                        self.status = JobStatus::Completed;
                    }
                }
            }
            JobMutation::Failed(failure) => {
                if failure.stage != self.stage {
                    return Err(format!(
                        "failure reported for {} but the job is at {}",
                        failure.stage, self.stage
                    ));
                }
                self.error = Some(failure);
                self.status = JobStatus::Failed;
            }
        }

        self.updated_at = Utc::now();
        Ok(())
    }
}
