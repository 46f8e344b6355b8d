//! Stage executors: the four conversion steps behind one uniform contract.

pub mod extract;
pub mod openai;
pub mod render;
pub mod subtitles;
pub mod summarize;
pub mod synthesize;

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::Config;
use crate::error::{ConfigError, StageError};
use crate::job::{ArtifactRef, Stage};
use crate::pipeline::JobContext;
use crate::secrets::resolve_secret;

pub use extract::PdfTextExtractor;
pub use openai::OpenAiClient;
pub use render::FfmpegRenderer;
pub use summarize::OpenAiSummarizer;
pub use synthesize::OpenAiSpeechSynthesizer;

/// One conversion step. Consumes the previous stage's artifact and produces
/// its own; never touches the job store.
#[async_trait]
pub trait StageExecutor: Send + Sync {
    /// The stage this executor implements.
    fn stage(&self) -> Stage;

    async fn execute(&self, input: &ArtifactRef, ctx: &JobContext)
        -> Result<ArtifactRef, StageError>;
}

/// Exactly one executor per stage.
#[derive(Clone)]
pub struct StageSet {
    executors: [Arc<dyn StageExecutor>; 4],
}

impl StageSet {
    /// Builds a set, rejecting executors registered under the wrong stage.
    pub fn new(
        extract: Arc<dyn StageExecutor>,
        summarize: Arc<dyn StageExecutor>,
        synthesize: Arc<dyn StageExecutor>,
        render: Arc<dyn StageExecutor>,
    ) -> Result<Self, ConfigError> {
        let executors = [extract, summarize, synthesize, render];
        for (expected, executor) in Stage::ALL.iter().zip(executors.iter()) {
            if executor.stage() != *expected {
                return Err(ConfigError::Validation {
                    message: format!(
                        "executor for {} reports stage {}",
                        expected,
                        executor.stage()
                    ),
                });
            }
        }
        Ok(Self { executors })
    }

    /// Production executors built from configuration. Fails when the API key
    /// cannot be resolved, so a misconfigured service never accepts a job.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let openai = &config.openai;
        let api_key = resolve_secret(
            openai.api_key.as_deref(),
            openai.api_key_file.as_deref(),
            openai.api_key_env.as_deref(),
        )
        .map_err(|source| ConfigError::Secret {
            name: "openai.api_key".to_string(),
            source,
        })?;
        let client = OpenAiClient::new(openai, api_key)?;

        Self::new(
            Arc::new(PdfTextExtractor::new()),
            Arc::new(OpenAiSummarizer::new(client.clone(), openai)),
            Arc::new(OpenAiSpeechSynthesizer::new(client, openai)),
            Arc::new(FfmpegRenderer::new(config.render.clone())),
        )
    }

    pub fn get(&self, stage: Stage) -> &Arc<dyn StageExecutor> {
        &self.executors[stage as usize]
    }
}
