//! Minimal client for the chat-completion and speech endpoints.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::OpenAiConfig;
use crate::error::{ConfigError, StageError};
use crate::sanitize::truncate_text;

const MAX_ERROR_BODY_CHARS: usize = 300;

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Serialize)]
struct SpeechRequest<'a> {
    model: &'a str,
    voice: &'a str,
    input: &'a str,
}

#[derive(Clone)]
pub struct OpenAiClient {
    http: Client,
    base_url: String,
    api_key: Arc<SecretString>,
}

impl OpenAiClient {
    pub fn new(config: &OpenAiConfig, api_key: SecretString) -> Result<Self, ConfigError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: Arc::new(api_key),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    /// Sends one system + user exchange and returns the assistant's reply.
    pub async fn chat_completion(
        &self,
        model: &str,
        system_prompt: &str,
        user_content: &str,
        max_tokens: u32,
    ) -> Result<String, StageError> {
        let request = ChatRequest {
            model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: user_content,
                },
            ],
            max_tokens,
        };

        let response = self
            .http
            .post(self.endpoint("chat/completions"))
            .bearer_auth(self.api_key.expose_secret())
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(StageError::Remote(format!(
                "Chat completion failed ({}): {}",
                status,
                truncate_text(&body, MAX_ERROR_BODY_CHARS)
            )));
        }

        let parsed: ChatResponse = response.json().await?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
            .ok_or_else(|| StageError::Remote("Chat completion returned no content".to_string()))?;

        debug!(chars = content.len(), "Received chat completion");
        Ok(content)
    }

    /// Synthesizes speech and returns the encoded audio bytes.
    pub async fn speech(&self, model: &str, voice: &str, input: &str) -> Result<Vec<u8>, StageError> {
        let request = SpeechRequest { model, voice, input };

        let response = self
            .http
            .post(self.endpoint("audio/speech"))
            .bearer_auth(self.api_key.expose_secret())
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(StageError::Remote(format!(
                "Speech synthesis failed ({}): {}",
                status,
                truncate_text(&body, MAX_ERROR_BODY_CHARS)
            )));
        }

        let audio = response.bytes().await?;
        if audio.is_empty() {
            return Err(StageError::Remote(
                "Speech synthesis returned no audio".to_string(),
            ));
        }

        debug!(bytes = audio.len(), "Received synthesized speech");
        Ok(audio.to_vec())
    }
}
