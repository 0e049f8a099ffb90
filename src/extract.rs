//! Table extraction entry point.
//!
//! [`TableExtractor::extract`] runs the whole pipeline for one stored file:
//!
//! ```text
//! file ──▶ encode ──▶ prompt(now) ──▶ VLM ──▶ strip fences ──▶ parse
//! ```
//!
//! The extractor holds no per-request state, so a single instance is built
//! at startup and shared by every request handler.

use crate::error::ExtractError;
use crate::output::ExtractionRecord;
use crate::pipeline::{encode, llm::VisionModel, postprocess};
use crate::prompts::{iso_timestamp, table_extraction_prompt};
use chrono::Utc;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

/// Turns table images and PDFs into JSON records via a vision model.
#[derive(Clone)]
pub struct TableExtractor {
    model: Arc<dyn VisionModel>,
}

impl TableExtractor {
    pub fn new(model: Arc<dyn VisionModel>) -> Self {
        Self { model }
    }

    /// Identifier of the underlying model.
    pub fn model(&self) -> &str {
        self.model.model()
    }

    /// Extract every table row from the file at `path`.
    ///
    /// # Errors
    /// Fails on the first error of any step: unreadable file, failed model
    /// call, or a reply that is not a JSON array. Nothing is retried and no
    /// partial record set is ever returned.
    pub async fn extract(
        &self,
        path: &Path,
        mime_type: &str,
    ) -> Result<Vec<ExtractionRecord>, ExtractError> {
        let start = Instant::now();
        let kind = if mime_type.contains("pdf") { "PDF" } else { "image" };
        info!("Processing {} with {}: {}", kind, self.model(), path.display());

        let result = self.run(path, mime_type).await;
        match &result {
            Ok(records) => info!(
                "Extracted {} records from {} in {}ms",
                records.len(),
                path.display(),
                start.elapsed().as_millis()
            ),
            Err(e) => error!("Extraction failed for {}: {}", path.display(), e),
        }
        result
    }

    async fn run(
        &self,
        path: &Path,
        mime_type: &str,
    ) -> Result<Vec<ExtractionRecord>, ExtractError> {
        let payload = encode::encode_file(path, mime_type).await?;
        let prompt = table_extraction_prompt(&iso_timestamp(Utc::now()));

        let text = self.model.complete(&prompt, payload).await?;
        info!("Model response received ({} chars)", text.len());

        postprocess::parse_records(&text)
    }
}
