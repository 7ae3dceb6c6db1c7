//! File management service.
//!
//! Handles upload validation, storage, and best-effort asset cleanup.

use std::sync::Arc;

use futures::future::join_all;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::storage::FileStorage;

/// Maximum file size (10 MB).
pub const MAX_FILE_SIZE: usize = 10 * 1024 * 1024;

/// Allowed MIME types for upload.
pub const ALLOWED_MIME_TYPES: &[&str] = &[
    // Images
    "image/jpeg",
    "image/png",
    "image/gif",
    "image/webp",
    "image/svg+xml",
    // Documents
    "application/pdf",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "application/vnd.ms-excel",
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    "text/plain",
    "text/csv",
    // Archives
    "application/zip",
    "application/gzip",
];

/// Folders an upload may target.
pub const UPLOAD_FOLDERS: &[&str] = &["page-thumbnails", "post-thumbnails", "post-files"];

/// Upload rejections.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("file is empty")]
    Empty,

    #[error("file too large: {size} bytes (max {max} bytes)", max = MAX_FILE_SIZE)]
    TooLarge { size: usize },

    #[error("file type not allowed: {0}")]
    UnsupportedType(String),

    #[error("unknown upload folder: {0}")]
    UnknownFolder(String),

    #[error("storage error: {0}")]
    Storage(#[source] anyhow::Error),
}

/// File upload result.
#[derive(Debug, Clone, Serialize)]
pub struct UploadResult {
    pub filename: String,
    /// Storage URI to persist on pages and posts.
    pub uri: String,
    /// Public URL for clients.
    pub url: String,
    pub size: usize,
    pub mime_type: String,
}

/// Outcome of deleting a set of assets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AssetCleanup {
    pub removed: usize,
    pub failed: usize,
    /// References left alone: external links and files uploaded by someone else.
    pub skipped: usize,
}

/// Determine the MIME type of an upload.
///
/// Content sniffing wins over the declared type when it recognizes the bytes;
/// text formats that carry no magic number fall back to the declared type.
pub fn detect_mime_type(data: &[u8], declared: Option<&str>) -> String {
    infer::get(data)
        .map(|kind| kind.mime_type().to_string())
        .or_else(|| declared.map(|d| d.trim().to_ascii_lowercase()))
        .unwrap_or_else(|| "application/octet-stream".to_string())
}

/// File service for uploads and asset cleanup.
pub struct FileService {
    storage: Arc<dyn FileStorage>,
}

impl FileService {
    /// Create a new file service.
    pub fn new(storage: Arc<dyn FileStorage>) -> Self {
        Self { storage }
    }

    /// Upload a file into `folder` on behalf of `owner`.
    ///
    /// Validates folder, size and MIME type, then writes the bytes.
    pub async fn upload(
        &self,
        owner: Uuid,
        folder: &str,
        filename: &str,
        declared_mime: Option<&str>,
        data: &[u8],
    ) -> Result<UploadResult, UploadError> {
        if !UPLOAD_FOLDERS.contains(&folder) {
            return Err(UploadError::UnknownFolder(folder.to_string()));
        }
        if data.is_empty() {
            return Err(UploadError::Empty);
        }
        if data.len() > MAX_FILE_SIZE {
            return Err(UploadError::TooLarge { size: data.len() });
        }

        let mime_type = detect_mime_type(data, declared_mime);
        if !ALLOWED_MIME_TYPES.contains(&mime_type.as_str()) {
            return Err(UploadError::UnsupportedType(mime_type));
        }

        let uri = self.storage.generate_uri(folder, owner, filename);
        self.storage
            .write(&uri, data)
            .await
            .map_err(UploadError::Storage)?;

        info!(uri = %uri, owner = %owner, size = data.len(), mime = %mime_type, "file uploaded");

        Ok(UploadResult {
            filename: filename.to_string(),
            url: self.storage.public_url(&uri),
            uri,
            size: data.len(),
            mime_type,
        })
    }

    /// Delete every asset in `uris` that `owner` uploaded, concurrently.
    ///
    /// Each deletion settles independently. Failures are logged and counted,
    /// never returned. References this backend does not hold, and files
    /// uploaded by another user, are skipped.
    pub async fn delete_best_effort<S: AsRef<str>>(&self, owner: Uuid, uris: &[S]) -> AssetCleanup {
        let mut cleanup = AssetCleanup::default();

        let owned: Vec<&str> = uris
            .iter()
            .map(AsRef::as_ref)
            .filter(|uri| {
                if uri.is_empty() || !self.storage.owns(uri) {
                    debug!(uri = %uri, "skipping asset not held in storage");
                    return false;
                }
                if self.storage.uploader(uri) != Some(owner) {
                    warn!(uri = %uri, owner = %owner, "skipping asset uploaded by another user");
                    return false;
                }
                true
            })
            .collect();
        cleanup.skipped = uris.len() - owned.len();

        let results = join_all(owned.iter().map(|uri| self.storage.delete(uri))).await;
        for (uri, result) in owned.iter().zip(results) {
            match result {
                Ok(()) => cleanup.removed += 1,
                Err(e) => {
                    warn!(uri = %uri, error = %e, "failed to delete asset");
                    cleanup.failed += 1;
                }
            }
        }

        cleanup
    }

    /// Public URL for a stored reference; non-storage references pass through.
    pub fn public_url(&self, reference: &str) -> String {
        if self.storage.owns(reference) {
            self.storage.public_url(reference)
        } else {
            reference.to_string()
        }
    }

    /// Get the storage backend.
    pub fn storage(&self) -> &Arc<dyn FileStorage> {
        &self.storage
    }
}

impl std::fmt::Debug for FileService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileService")
            .field("scheme", &self.storage.scheme())
            .finish()
    }
}
