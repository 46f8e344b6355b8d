use async_trait::async_trait;
use tracing::info;

use crate::config::OpenAiConfig;
use crate::error::StageError;
use crate::job::{ArtifactKind, ArtifactRef, Stage};
use crate::pipeline::JobContext;

use super::openai::OpenAiClient;
use super::StageExecutor;

const OUTPUT_FILE: &str = "summary.txt";

/// Turns the extracted document text into a narration script.
pub struct OpenAiSummarizer {
    client: OpenAiClient,
    model: String,
    prompt: String,
    max_tokens: u32,
}

impl OpenAiSummarizer {
    pub fn new(client: OpenAiClient, config: &OpenAiConfig) -> Self {
        Self {
            client,
            model: config.summary_model.clone(),
            prompt: config.narrator_prompt.clone(),
            max_tokens: config.summary_max_tokens,
        }
    }
}

#[async_trait]
impl StageExecutor for OpenAiSummarizer {
    fn stage(&self) -> Stage {
        Stage::Summarize
    }

    async fn execute(&self, input: &ArtifactRef, ctx: &JobContext) -> Result<ArtifactRef, StageError> {
        let source = input.path();
        let text = tokio::fs::read_to_string(&source)
            .await
            .map_err(|e| StageError::ReadArtifact {
                path: source.clone(),
                source: e,
            })?;
        if text.trim().is_empty() {
            return Err(StageError::InvalidInput(
                "Extracted text is empty".to_string(),
            ));
        }

        let summary = self
            .client
            .chat_completion(&self.model, &self.prompt, &text, self.max_tokens)
            .await?;

        let output = ctx.work_file(OUTPUT_FILE);
        tokio::fs::write(&output, &summary)
            .await
            .map_err(|e| StageError::WriteArtifact {
                path: output.clone(),
                source: e,
            })?;

        info!(
            model = %self.model,
            input_chars = text.len(),
            summary_chars = summary.len(),
            "Summarized document"
        );
        Ok(ArtifactRef::from_path(ArtifactKind::Summary, &output))
    }
}
