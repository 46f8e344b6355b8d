use std::path::Path;

use crate::config::schema::Config;
use crate::error::ConfigError;

const SCHEMA_JSON: &str = include_str!("../../schema/config-v1.json");

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    let json_value: serde_json::Value = serde_json::from_str(content)?;

    validate_schema(&json_value)?;

    let config: Config = serde_json::from_value(json_value)?;

    validate_config(&config)?;

    Ok(config)
}

fn validate_schema(json_value: &serde_json::Value) -> Result<(), ConfigError> {
    let schema: serde_json::Value =
        serde_json::from_str(SCHEMA_JSON).map_err(|e| ConfigError::Validation {
            message: format!("Invalid embedded schema JSON: {}", e),
        })?;

    let validator = jsonschema::validator_for(&schema).map_err(|e| ConfigError::Validation {
        message: format!("Failed to compile JSON schema: {}", e),
    })?;

    let messages: Vec<String> = validator
        .iter_errors(json_value)
        .map(|e| e.to_string())
        .collect();
    if !messages.is_empty() {
        return Err(ConfigError::SchemaValidation {
            errors: messages.join("; "),
        });
    }

    Ok(())
}

/// Checks the constraints a JSON schema cannot express.
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.version != "1.0" {
        return Err(invalid(format!(
            "Unsupported config version: {}",
            config.version
        )));
    }

    if config.max_upload_bytes == 0 {
        return Err(invalid("max_upload_bytes must be greater than zero"));
    }

    if config.accepted_content_types.is_empty() {
        return Err(invalid("accepted_content_types must not be empty"));
    }

    if config.stage_timeout_secs == Some(0) {
        return Err(invalid(
            "stage_timeout_secs must be positive (use null to disable)",
        ));
    }

    if config.retry.max_attempts == 0 {
        return Err(invalid("retry.max_attempts must be at least 1"));
    }

    if config.render.words_per_subtitle == 0 {
        return Err(invalid("render.words_per_subtitle must be at least 1"));
    }

    if !(config.render.seconds_per_word.is_finite() && config.render.seconds_per_word > 0.0) {
        return Err(invalid("render.seconds_per_word must be a positive number"));
    }

    if !config.video_base_url.starts_with('/') && !config.video_base_url.contains("://") {
        return Err(invalid(format!(
            "video_base_url must be an absolute path or URL: {}",
            config.video_base_url
        )));
    }

    Ok(())
}

fn invalid(message: impl Into<String>) -> ConfigError {
    ConfigError::Validation {
        message: message.into(),
    }
}
