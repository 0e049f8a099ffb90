//! Error types for the table2json library.
//!
//! Three error types reflect three distinct failure modes:
//!
//! * [`StartupError`]: **Fatal at boot**. The server cannot start (missing
//!   API key, unusable uploads directory, port already taken). Returned from
//!   [`crate::server::run`] before any request is served.
//!
//! * [`UploadError`]: **Per request**. Either the client sent something we
//!   refuse (no file, wrong type, too large) or processing failed. Converted
//!   into a JSON error body at the handler boundary via
//!   [`axum::response::IntoResponse`]; it never takes the process down.
//!
//! * [`ExtractError`]: a failure inside the extraction pipeline (file read,
//!   model call, unparseable model output). Always surfaces wrapped in
//!   [`UploadError::Extraction`] when it reaches HTTP.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Prefix applied once to every extraction failure shown to a caller.
pub const EXTRACTION_FAILED: &str = "Failed to process the table image";

/// Errors that prevent the server from starting.
#[derive(Debug, Error)]
pub enum StartupError {
    /// The model API key is not present in the environment.
    #[error("{var} is not set.\nExport it before starting the server: export {var}=<your-api-key>")]
    MissingCredential { var: String },

    /// The LLM provider could not be constructed.
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The uploads directory could not be created.
    #[error("Cannot create uploads directory '{path}': {source}")]
    UploadsDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The listening socket could not be bound.
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// The server loop exited with an I/O error.
    #[error("Server error: {0}")]
    Serve(#[source] std::io::Error),
}

/// Failures of the extraction pipeline for one file.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// The stored upload could not be read back.
    #[error("cannot read '{path}': {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The inference API call failed (network, auth, quota, empty reply).
    #[error("model '{model}' call failed: {message}")]
    ModelCall { model: String, message: String },

    /// The cleaned model output is not valid JSON.
    #[error("model response is not valid JSON: {source}")]
    MalformedJson {
        #[source]
        source: serde_json::Error,
    },

    /// The model output parsed, but is not a JSON array of rows.
    #[error("model response is JSON but not an array (got {found})")]
    NotAnArray { found: &'static str },
}

/// Errors returned by the `POST /upload` handler.
#[derive(Debug, Error)]
pub enum UploadError {
    // ── Client errors (400) ───────────────────────────────────────────────
    /// The multipart body has no part named `file`.
    #[error("No file was received (expected a multipart field named '{field}')")]
    MissingFile { field: String },

    /// The file part exceeds the configured size limit.
    #[error("The file is too large (max. {})", format_limit(.limit))]
    FileTooLarge { limit: usize },

    /// The whole request body hit its cap (oversized text fields).
    #[error("The request body is too large (max. {})", format_limit(.limit))]
    BodyTooLarge { limit: usize },

    /// The part's content type is neither `image/*` nor `application/pdf`.
    #[error("Only images (PNG, JPG, JPEG) or PDF files are allowed (got '{mime}')")]
    UnsupportedType { mime: String },

    /// A second file, or a file under a field other than `file`.
    #[error("Unexpected file field '{field}'")]
    UnexpectedField { field: String },

    /// The request body is not valid multipart/form-data.
    #[error("Malformed multipart body: {0}")]
    Multipart(String),

    // ── Server errors (500) ───────────────────────────────────────────────
    /// The accepted file could not be written to the uploads directory.
    #[error("Failed to store upload '{path}': {source}")]
    Storage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Extraction failed after the file was stored.
    #[error("Failed to process the table image: {0}")]
    Extraction(#[from] ExtractError),
}

/// JSON body returned for every failed request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl UploadError {
    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            UploadError::MissingFile { .. }
            | UploadError::FileTooLarge { .. }
            | UploadError::BodyTooLarge { .. }
            | UploadError::UnsupportedType { .. }
            | UploadError::UnexpectedField { .. }
            | UploadError::Multipart(_) => StatusCode::BAD_REQUEST,
            UploadError::Storage { .. } | UploadError::Extraction(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Body sent to the caller.
    ///
    /// Validation errors carry their message in `error`; server-side failures
    /// use a fixed headline in `error` and the full message in `details`.
    pub fn body(&self) -> ErrorBody {
        match self {
            UploadError::Storage { .. } => ErrorBody {
                error: "Failed to store the uploaded file".to_string(),
                details: Some(self.to_string()),
            },
            UploadError::Extraction(_) => ErrorBody {
                error: EXTRACTION_FAILED.to_string(),
                details: Some(self.to_string()),
            },
            _ => ErrorBody {
                error: self.to_string(),
                details: None,
            },
        }
    }
}

/// Human-readable size limit: whole MB when possible, else KB or bytes.
fn format_limit(bytes: &usize) -> String {
    const KIB: usize = 1024;
    const MIB: usize = 1024 * 1024;
    match *bytes {
        b if b >= MIB && b % MIB == 0 => format!("{} MB", b / MIB),
        b if b >= MIB => format!("{:.1} MB", b as f64 / MIB as f64),
        b if b >= KIB && b % KIB == 0 => format!("{} KB", b / KIB),
        b if b >= KIB => format!("{:.1} KB", b as f64 / KIB as f64),
        b => format!("{b} bytes"),
    }
}

impl IntoResponse for UploadError {
    fn into_response(self) -> Response {
        (self.status(), Json(self.body())).into_response()
    }
}
