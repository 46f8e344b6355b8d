use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Content kind of an artifact passed between stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Document,
    ExtractedText,
    Summary,
    NarrationAudio,
    Video,
}

impl std::fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ArtifactKind::Document => "document",
            ArtifactKind::ExtractedText => "extracted-text",
            ArtifactKind::Summary => "summary",
            ArtifactKind::NarrationAudio => "narration-audio",
            ArtifactKind::Video => "video",
        };
        f.write_str(name)
    }
}

/// Opaque locator for an immutable artifact plus its content kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactRef {
    pub kind: ArtifactKind,
    pub locator: String,
}

impl ArtifactRef {
    pub fn new(kind: ArtifactKind, locator: impl Into<String>) -> Self {
        Self {
            kind,
            locator: locator.into(),
        }
    }

    pub fn from_path(kind: ArtifactKind, path: &Path) -> Self {
        Self::new(kind, path.display().to_string())
    }

    /// Locators produced by this crate are filesystem paths.
    pub fn path(&self) -> PathBuf {
        PathBuf::from(&self.locator)
    }
}
