//! Helpers for keeping local paths and user text out of log fields.

use std::path::Path;

/// Keeps the file name and drops the directories.
pub fn redact_path(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("<unknown>")
        .to_string()
}

/// Shortens free text (remote error bodies, tool stderr) for logs and job
/// error messages, cutting on a character boundary.
pub fn truncate_text(text: &str, max_chars: usize) -> String {
    let trimmed = text.trim();
    match trimmed.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &trimmed[..cut]),
        None => trimmed.to_string(),
    }
}
