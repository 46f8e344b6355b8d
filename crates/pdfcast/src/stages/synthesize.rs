use async_trait::async_trait;
use tracing::info;

use crate::config::OpenAiConfig;
use crate::error::StageError;
use crate::job::{ArtifactKind, ArtifactRef, Stage};
use crate::pipeline::JobContext;

use super::openai::OpenAiClient;
use super::StageExecutor;

const OUTPUT_FILE: &str = "narration.mp3";

/// Reads the summary aloud with a text-to-speech voice.
pub struct OpenAiSpeechSynthesizer {
    client: OpenAiClient,
    model: String,
    voice: String,
}

impl OpenAiSpeechSynthesizer {
    pub fn new(client: OpenAiClient, config: &OpenAiConfig) -> Self {
        Self {
            client,
            model: config.tts_model.clone(),
            voice: config.voice.clone(),
        }
    }
}

#[async_trait]
impl StageExecutor for OpenAiSpeechSynthesizer {
    fn stage(&self) -> Stage {
        Stage::Synthesize
    }

    async fn execute(&self, input: &ArtifactRef, ctx: &JobContext) -> Result<ArtifactRef, StageError> {
        let source = input.path();
        let summary = tokio::fs::read_to_string(&source)
            .await
            .map_err(|e| StageError::ReadArtifact {
                path: source.clone(),
                source: e,
            })?;
        if summary.trim().is_empty() {
            return Err(StageError::InvalidInput("Summary is empty".to_string()));
        }

        let audio = self
            .client
            .speech(&self.model, &self.voice, summary.trim())
            .await?;

        let output = ctx.work_file(OUTPUT_FILE);
        tokio::fs::write(&output, &audio)
            .await
            .map_err(|e| StageError::WriteArtifact {
                path: output.clone(),
                source: e,
            })?;

        info!(voice = %self.voice, bytes = audio.len(), "Synthesized narration");
        Ok(ArtifactRef::from_path(ArtifactKind::NarrationAudio, &output))
    }
}
