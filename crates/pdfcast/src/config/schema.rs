use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub version: String,
    #[serde(default)]
    pub upload_directory: Option<String>,
    #[serde(default)]
    pub work_directory: Option<String>,
    #[serde(default)]
    pub output_directory: Option<String>,
    #[serde(default = "default_video_base_url")]
    pub video_base_url: String,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: u64,
    #[serde(default = "default_accepted_content_types")]
    pub accepted_content_types: Vec<String>,
    /// `None` disables the per-stage timeout.
    #[serde(default = "default_stage_timeout_secs")]
    pub stage_timeout_secs: Option<u64>,
    /// Age after which finished jobs may be purged. `None` keeps them forever.
    #[serde(default)]
    pub retention_secs: Option<u64>,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub openai: OpenAiConfig,
    #[serde(default)]
    pub render: RenderConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_video_base_url() -> String {
    "/videos".to_string()
}

fn default_max_upload_bytes() -> u64 {
    10 * 1024 * 1024
}

fn default_accepted_content_types() -> Vec<String> {
    vec!["application/pdf".to_string()]
}

fn default_stage_timeout_secs() -> Option<u64> {
    Some(1800)
}

fn data_root() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("pdfcast")
}

impl Config {
    /// A configuration with every optional field at its default.
    pub fn with_defaults() -> Self {
        Self {
            version: "1.0".to_string(),
            upload_directory: None,
            work_directory: None,
            output_directory: None,
            video_base_url: default_video_base_url(),
            max_upload_bytes: default_max_upload_bytes(),
            accepted_content_types: default_accepted_content_types(),
            stage_timeout_secs: default_stage_timeout_secs(),
            retention_secs: None,
            retry: RetryConfig::default(),
            openai: OpenAiConfig::default(),
            render: RenderConfig::default(),
            logging: LoggingConfig::default(),
        }
    }

    pub fn upload_dir(&self) -> PathBuf {
        self.upload_directory
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(|| data_root().join("input"))
    }

    pub fn work_dir(&self) -> PathBuf {
        self.work_directory
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(|| data_root().join("work"))
    }

    pub fn output_dir(&self) -> PathBuf {
        self.output_directory
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(|| data_root().join("output"))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts per stage invocation, including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
}

fn default_max_attempts() -> u32 {
    1
}

fn default_backoff_ms() -> u64 {
    500
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_ms: default_backoff_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub api_key_file: Option<String>,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: Option<String>,
    #[serde(default = "default_summary_model")]
    pub summary_model: String,
    #[serde(default = "default_summary_max_tokens")]
    pub summary_max_tokens: u32,
    #[serde(default = "default_narrator_prompt")]
    pub narrator_prompt: String,
    #[serde(default = "default_tts_model")]
    pub tts_model: String,
    #[serde(default = "default_voice")]
    pub voice: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_api_key_env() -> Option<String> {
    Some("OPENAI_API_KEY".to_string())
}

fn default_summary_model() -> String {
    "gpt-4o".to_string()
}

fn default_summary_max_tokens() -> u32 {
    10000
}

fn default_narrator_prompt() -> String {
    "You are the narrator of an explanation video. Summarize the following academic content \
     in a way that highlights the most important points and is engaging for the audience."
        .to_string()
}

fn default_tts_model() -> String {
    "tts-1".to_string()
}

fn default_voice() -> String {
    "ash".to_string()
}

fn default_request_timeout_secs() -> u64 {
    300
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: None,
            api_key_file: None,
            api_key_env: default_api_key_env(),
            summary_model: default_summary_model(),
            summary_max_tokens: default_summary_max_tokens(),
            narrator_prompt: default_narrator_prompt(),
            tts_model: default_tts_model(),
            voice: default_voice(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    #[serde(default = "default_ffmpeg")]
    pub ffmpeg: String,
    #[serde(default = "default_ffprobe")]
    pub ffprobe: String,
    /// Footage looped underneath the narration.
    #[serde(default)]
    pub background_video: Option<String>,
    #[serde(default = "default_font_size")]
    pub font_size: u32,
    #[serde(default = "default_words_per_subtitle")]
    pub words_per_subtitle: usize,
    #[serde(default = "default_seconds_per_word")]
    pub seconds_per_word: f64,
}

fn default_ffmpeg() -> String {
    "ffmpeg".to_string()
}

fn default_ffprobe() -> String {
    "ffprobe".to_string()
}

fn default_font_size() -> u32 {
    24
}

fn default_words_per_subtitle() -> usize {
    10
}

fn default_seconds_per_word() -> f64 {
    0.375
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            ffmpeg: default_ffmpeg(),
            ffprobe: default_ffprobe(),
            background_video: None,
            font_size: default_font_size(),
            words_per_subtitle: default_words_per_subtitle(),
            seconds_per_word: default_seconds_per_word(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub format: LogFormat,
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

fn default_log_filter() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            filter: default_log_filter(),
        }
    }
}
