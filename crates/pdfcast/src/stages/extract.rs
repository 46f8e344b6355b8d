use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::StageError;
use crate::job::{ArtifactKind, ArtifactRef, Stage};
use crate::pipeline::JobContext;

use super::StageExecutor;

const OUTPUT_FILE: &str = "extracted.txt";

/// Pulls the embedded text out of the uploaded PDF, page by page.
#[derive(Debug, Default)]
pub struct PdfTextExtractor;

impl PdfTextExtractor {
    pub fn new() -> Self {
        Self
    }
}

/// Concatenates the text of every page in page order.
pub fn extract_text(pdf_bytes: &[u8]) -> Result<String, StageError> {
    let doc = lopdf::Document::load_mem(pdf_bytes)
        .map_err(|e| StageError::PdfProcessing(format!("Failed to load PDF: {}", e)))?;

    let mut text = String::new();
    for (page_num, _) in doc.get_pages() {
        match doc.extract_text(&[page_num]) {
            Ok(page_text) => {
                text.push_str(page_text.trim_end());
                text.push('\n');
            }
            Err(e) => warn!(page = page_num, error = %e, "Skipping page without extractable text"),
        }
    }

    Ok(text)
}

#[async_trait]
impl StageExecutor for PdfTextExtractor {
    fn stage(&self) -> Stage {
        Stage::Extract
    }

    async fn execute(&self, input: &ArtifactRef, ctx: &JobContext) -> Result<ArtifactRef, StageError> {
        let source = input.path();
        let bytes = tokio::fs::read(&source)
            .await
            .map_err(|e| StageError::ReadArtifact {
                path: source.clone(),
                source: e,
            })?;

        let text = tokio::task::spawn_blocking(move || extract_text(&bytes))
            .await
            .map_err(|e| StageError::PdfProcessing(format!("Extraction task failed: {}", e)))??;

        if text.trim().is_empty() {
            return Err(StageError::InvalidInput(
                "Document contains no extractable text".to_string(),
            ));
        }

        let output = ctx.work_file(OUTPUT_FILE);
        tokio::fs::write(&output, &text)
            .await
            .map_err(|e| StageError::WriteArtifact {
                path: output.clone(),
                source: e,
            })?;

        debug!(chars = text.len(), "Extracted document text");
        Ok(ArtifactRef::from_path(ArtifactKind::ExtractedText, &output))
    }
}
