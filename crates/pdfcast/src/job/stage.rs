use serde::{Deserialize, Serialize};

use super::artifact::ArtifactKind;

/// One of the four ordered conversion steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Stage {
    Extract,
    Summarize,
    Synthesize,
    Render,
}

impl Stage {
    /// Stages in execution order.
    pub const ALL: [Stage; 4] = [
        Stage::Extract,
        Stage::Summarize,
        Stage::Synthesize,
        Stage::Render,
    ];

    pub fn first() -> Stage {
        Stage::Extract
    }

    pub fn next(self) -> Option<Stage> {
        match self {
            Stage::Extract => Some(Stage::Summarize),
            Stage::Summarize => Some(Stage::Synthesize),
            Stage::Synthesize => Some(Stage::Render),
            Stage::Render => None,
        }
    }

    pub fn is_last(self) -> bool {
        self.next().is_none()
    }

    /// Artifact kind this stage consumes.
    pub fn input_kind(self) -> ArtifactKind {
        match self {
            Stage::Extract => ArtifactKind::Document,
            Stage::Summarize => ArtifactKind::ExtractedText,
            Stage::Synthesize => ArtifactKind::Summary,
            Stage::Render => ArtifactKind::NarrationAudio,
        }
    }

    /// Artifact kind this stage produces.
    pub fn output_kind(self) -> ArtifactKind {
        match self {
            Stage::Extract => ArtifactKind::ExtractedText,
            Stage::Summarize => ArtifactKind::Summary,
            Stage::Synthesize => ArtifactKind::NarrationAudio,
            Stage::Render => ArtifactKind::Video,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Extract => "Extract",
            Stage::Summarize => "Summarize",
            Stage::Synthesize => "Synthesize",
            Stage::Render => "Render",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle status of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_order_follows_sequence() {
        let mut walked = vec![Stage::first()];
        while let Some(next) = walked.last().and_then(|s| s.next()) {
            walked.push(next);
        }
        assert_eq!(walked, Stage::ALL.to_vec());
        assert!(Stage::Extract < Stage::Summarize);
        assert!(Stage::Synthesize < Stage::Render);
        assert!(Stage::Render.is_last());
    }

    #[test]
    fn test_stage_contract_chains() {
        for pair in Stage::ALL.windows(2) {
            assert_eq!(pair[0].output_kind(), pair[1].input_kind());
        }
        assert_eq!(Stage::Extract.input_kind(), ArtifactKind::Document);
        assert_eq!(Stage::Render.output_kind(), ArtifactKind::Video);
    }

    #[test]
    fn test_serialization_names() {
        assert_eq!(
            serde_json::to_string(&Stage::Synthesize).unwrap(),
            "\"Synthesize\""
        );
        assert_eq!(
            serde_json::to_string(&JobStatus::Completed).unwrap(),
            "\"completed\""
        );
    }

    #[test]
    fn test_terminal_status() {
        assert!(!JobStatus::Pending.is_terminal());
        assert!(!JobStatus::Running.is_terminal());
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
    }
}
