//! File and media management.
//!
//! Provides upload validation, object storage, and asset cleanup.

pub mod service;
pub mod storage;

pub use service::{
    ALLOWED_MIME_TYPES, AssetCleanup, FileService, MAX_FILE_SIZE, UPLOAD_FOLDERS, UploadError,
    UploadResult,
};
pub use storage::{FileStorage, LocalFileStorage};

#[cfg(feature = "s3")]
pub use storage::S3FileStorage;
