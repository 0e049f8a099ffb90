//! Shared application state for the HTTP server.

use crate::config::ServerConfig;
use crate::extract::TableExtractor;
use std::path::Path;
use std::sync::Arc;

/// Room on top of the file limit for text fields and multipart framing.
pub const FORM_FIELDS_ALLOWANCE: usize = 1024 * 1024;

/// Immutable per-process state handed to every request.
///
/// Built once at startup; cloning is an `Arc` bump.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ServerConfig,
    extractor: TableExtractor,
}

impl AppState {
    pub fn new(config: ServerConfig, extractor: TableExtractor) -> Self {
        Self {
            inner: Arc::new(AppStateInner { config, extractor }),
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.inner.config
    }

    pub fn extractor(&self) -> &TableExtractor {
        &self.inner.extractor
    }

    pub fn uploads_dir(&self) -> &Path {
        &self.inner.config.uploads_dir
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.inner.config.max_upload_bytes
    }

    /// Cap on the whole request body: the file limit plus [`FORM_FIELDS_ALLOWANCE`].
    pub fn max_body_bytes(&self) -> usize {
        self.max_upload_bytes().saturating_add(FORM_FIELDS_ALLOWANCE)
    }
}
