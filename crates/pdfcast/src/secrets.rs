//! Resolution of the remote-service API key.
//!
//! Sources are tried in priority order:
//!
//! 1. **Direct value**: `api_key` in the config, handy for local testing
//! 2. **File reference**: `api_key_file`, for mounted secrets
//! 3. **Env var reference**: `api_key_env`, `OPENAI_API_KEY` unless overridden

use secrecy::SecretString;
use std::fs;

#[derive(Debug, thiserror::Error)]
pub enum SecretError {
    #[error("No API key source configured (set api_key, api_key_file or api_key_env)")]
    NoSourceProvided,

    #[error("Cannot read key file '{path}': {source}")]
    FileReadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Secret file '{path}' is empty")]
    EmptyFile { path: String },

    #[error("Environment variable '{name}' is unset or empty")]
    EnvVarNotSet { name: String },

    #[error("Environment variable '{name}' is not valid UTF-8")]
    EnvVarNotUnicode { name: String },
}

pub type Result<T> = std::result::Result<T, SecretError>;

/// Resolves a secret from the first source that is present and non-empty.
///
/// ```ignore
/// use pdfcast::secrets::resolve_secret;
///
/// let key = resolve_secret(None, Some("~/.config/pdfcast/openai.key"), Some("OPENAI_API_KEY"))?;
/// ```
pub fn resolve_secret(
    direct: Option<&str>,
    file_path: Option<&str>,
    env_var: Option<&str>,
) -> Result<SecretString> {
    if let Some(value) = direct.filter(|v| !v.is_empty()) {
        return Ok(SecretString::from(value.to_string()));
    }

    if let Some(path) = file_path.filter(|p| !p.is_empty()) {
        let expanded = expand_home(path);
        let content = fs::read_to_string(&expanded).map_err(|source| {
            SecretError::FileReadError {
                path: expanded.clone(),
                source,
            }
        })?;
        let trimmed = content.trim();
        if trimmed.is_empty() {
            return Err(SecretError::EmptyFile { path: expanded });
        }
        return Ok(SecretString::from(trimmed.to_string()));
    }

    if let Some(name) = env_var.filter(|n| !n.is_empty()) {
        return match std::env::var(name) {
            Ok(value) if !value.trim().is_empty() => {
                Ok(SecretString::from(value.trim().to_string()))
            }
            Ok(_) | Err(std::env::VarError::NotPresent) => Err(SecretError::EnvVarNotSet {
                name: name.to_string(),
            }),
            Err(std::env::VarError::NotUnicode(_)) => Err(SecretError::EnvVarNotUnicode {
                name: name.to_string(),
            }),
        };
    }

    Err(SecretError::NoSourceProvided)
}

/// Expands a leading `~` to the user's home directory. `~user` is not supported.
fn expand_home(path: &str) -> String {
    if path == "~" || path.starts_with("~/") {
        if let Some(home) = dirs::home_dir() {
            let home = home.to_string_lossy();
            if path == "~" {
                return home.into_owned();
            }
            return path.replacen('~', &home, 1);
        }
    }
    path.to_string()
}
