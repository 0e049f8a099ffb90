//! Upload persistence: naming, type checks, and writing to the uploads directory.

use crate::error::{StartupError, UploadError};
use rand::Rng;
use std::path::{Path, PathBuf};
use tracing::debug;

/// An accepted upload after it has been written to disk.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    /// Full path of the stored copy.
    pub path: PathBuf,
    /// Name inside the uploads directory.
    pub stored_name: String,
    /// Name the client sent.
    pub original_name: String,
    /// Declared content type of the part.
    pub mime_type: String,
    pub size: usize,
}

/// `image/*` or `application/pdf`, ignoring parameters and case.
pub fn is_supported_mime(mime: &str) -> bool {
    let essence = mime
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();
    essence.starts_with("image/") || essence == "application/pdf"
}

/// Keep only the final path component of a client-supplied file name.
///
/// Both `/` and `\` count as separators so a Windows path cannot escape the
/// uploads directory either. Falls back to `upload` when nothing is left.
pub fn sanitize_file_name(name: &str) -> String {
    let last = name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or("")
        .trim();
    if last.is_empty() || last == "." || last == ".." {
        "upload".to_string()
    } else {
        last.to_string()
    }
}

/// Collision-resistant stored name: `<epoch-ms>-<random-int>-<original-name>`.
pub fn stored_name(original: &str, epoch_ms: i64, suffix: u32) -> String {
    format!("{}-{}-{}", epoch_ms, suffix, sanitize_file_name(original))
}

/// Generate a stored name for `original` using the current time.
pub fn generate_stored_name(original: &str) -> String {
    let suffix = rand::thread_rng().gen_range(0..=1_000_000_000u32);
    stored_name(original, chrono::Utc::now().timestamp_millis(), suffix)
}

/// Create the uploads directory (and parents) if it does not exist.
pub async fn ensure_uploads_dir(dir: &Path) -> Result<(), StartupError> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|source| StartupError::UploadsDir {
            path: dir.to_path_buf(),
            source,
        })
}

/// Write an accepted upload into `dir` under a freshly generated name.
pub async fn store_upload(
    dir: &Path,
    original_name: &str,
    mime_type: &str,
    bytes: &[u8],
) -> Result<UploadedFile, UploadError> {
    let stored = generate_stored_name(original_name);
    let path = dir.join(&stored);

    tokio::fs::write(&path, bytes)
        .await
        .map_err(|source| UploadError::Storage {
            path: path.clone(),
            source,
        })?;

    debug!("Stored upload at {}", path.display());

    Ok(UploadedFile {
        path,
        stored_name: stored,
        original_name: original_name.to_string(),
        mime_type: mime_type.to_string(),
        size: bytes.len(),
    })
}
