//! File encoding: stored upload → base64 [`InlinePayload`].
//!
//! Multimodal APIs accept binary attachments as base64 text next to a MIME
//! tag inside the JSON request body. The bytes are sent untouched: images are
//! not re-encoded and PDFs are not rasterised.

use crate::error::ExtractError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::path::Path;
use tracing::debug;

/// A file's bytes as base64 text plus the MIME type they were declared with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlinePayload {
    pub data: String,
    pub mime_type: String,
}

impl InlinePayload {
    /// Encode raw bytes.
    pub fn from_bytes(bytes: &[u8], mime_type: impl Into<String>) -> Self {
        let data = STANDARD.encode(bytes);
        debug!("Encoded {} bytes → {} bytes base64", bytes.len(), data.len());
        Self {
            data,
            mime_type: mime_type.into(),
        }
    }
}

/// Read `path` fully and encode it as an inline payload.
pub async fn encode_file(path: &Path, mime_type: &str) -> Result<InlinePayload, ExtractError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|source| ExtractError::ReadFailed {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(InlinePayload::from_bytes(&bytes, mime_type))
}
