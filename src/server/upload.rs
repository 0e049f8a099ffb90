//! `POST /upload`: accept one table image or PDF and return its rows as JSON.

use axum::extract::multipart::{Field, MultipartError, MultipartRejection};
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::Json;
use tracing::{error, info};

use crate::config::UPLOAD_FIELD;
use crate::error::UploadError;
use crate::output::UploadResponse;
use crate::server::state::AppState;
use crate::server::storage::{self, UploadedFile};

/// A validated file part held in memory until it is stored.
struct AcceptedPart {
    original_name: String,
    mime_type: String,
    bytes: Vec<u8>,
}

/// POST /upload - store the file, extract its table, return the records.
pub async fn upload_table(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>, UploadError> {
    let multipart = multipart.map_err(|rej| UploadError::Multipart(rej.body_text()))?;
    let part =
        read_single_file(multipart, state.max_upload_bytes(), state.max_body_bytes()).await?;

    let kind = if part.mime_type.contains("pdf") { "PDF" } else { "Image" };
    info!(
        "{} received: {} ({:.2} KB)",
        kind,
        part.original_name,
        part.bytes.len() as f64 / 1024.0
    );

    let file = storage::store_upload(
        state.uploads_dir(),
        &part.original_name,
        &part.mime_type,
        &part.bytes,
    )
    .await?;
    drop(part);

    process_upload(&state, file).await
}

/// Run extraction on a stored file. The file stays on disk whatever happens.
async fn process_upload(
    state: &AppState,
    file: UploadedFile,
) -> Result<Json<UploadResponse>, UploadError> {
    match state.extractor().extract(&file.path, &file.mime_type).await {
        Ok(records) => {
            info!(
                "Processing complete: {} records from {}",
                records.len(),
                file.stored_name
            );
            Ok(Json(UploadResponse::new(
                file.stored_name,
                file.original_name,
                records,
            )))
        }
        Err(e) => {
            error!("Error processing {}: {}", file.stored_name, e);
            Err(UploadError::Extraction(e))
        }
    }
}

/// Pull exactly one file part named [`UPLOAD_FIELD`] out of the body.
///
/// The content type is checked before any of the part is read, and the size
/// limit while it streams in, so rejected files never reach the disk.
/// `body_limit` is the cap on the whole request; only the file part is held
/// to `limit`.
async fn read_single_file(
    mut multipart: Multipart,
    limit: usize,
    body_limit: usize,
) -> Result<AcceptedPart, UploadError> {
    let mut accepted: Option<AcceptedPart> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, body_limit))?
    {
        let name = field.name().unwrap_or("").to_string();

        // Plain text fields ride along untouched.
        let Some(file_name) = field.file_name().map(str::to_string) else {
            continue;
        };

        if name != UPLOAD_FIELD || accepted.is_some() {
            return Err(UploadError::UnexpectedField { field: name });
        }

        let mime_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        if !storage::is_supported_mime(&mime_type) {
            return Err(UploadError::UnsupportedType { mime: mime_type });
        }

        let bytes = read_limited(field, limit, body_limit).await?;
        accepted = Some(AcceptedPart {
            original_name: file_name,
            mime_type,
            bytes,
        });
    }

    accepted.ok_or_else(|| UploadError::MissingFile {
        field: UPLOAD_FIELD.to_string(),
    })
}

/// Read a part chunk by chunk, failing as soon as it exceeds `limit` bytes.
async fn read_limited(
    mut field: Field<'_>,
    limit: usize,
    body_limit: usize,
) -> Result<Vec<u8>, UploadError> {
    let mut buf = Vec::new();
    while let Some(chunk) = field
        .chunk()
        .await
        .map_err(|e| multipart_error(e, body_limit))?
    {
        if buf.len() + chunk.len() > limit {
            return Err(UploadError::FileTooLarge { limit });
        }
        buf.extend_from_slice(&chunk);
    }
    Ok(buf)
}

/// Map a multipart parse error.
///
/// The file part is counted in [`read_limited`]; a 413 here means the body as
/// a whole hit `body_limit`.
fn multipart_error(e: MultipartError, body_limit: usize) -> UploadError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        UploadError::BodyTooLarge { limit: body_limit }
    } else {
        UploadError::Multipart(e.body_text())
    }
}
