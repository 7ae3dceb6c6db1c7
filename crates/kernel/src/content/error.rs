//! Content service errors.

use thiserror::Error;
use tracing::debug;

use crate::store::StoreError;

/// Re-reads of a scope allowed after a conflicting commit.
pub const MAX_CONFLICT_RETRIES: u32 = 3;

/// Errors returned by page and post services.
#[derive(Debug, Error)]
pub enum ContentError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("not found")]
    NotFound,

    /// The sibling snapshot went stale before the batch committed.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("store error: {0}")]
    Store(#[source] StoreError),
}

impl From<StoreError> for ContentError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(reason) => ContentError::Conflict(reason),
            StoreError::NotFound => ContentError::NotFound,
            other => ContentError::Store(other),
        }
    }
}

/// Result type alias using ContentError.
pub type ContentResult<T> = Result<T, ContentError>;

/// Whether a failed attempt should be retried against a fresh snapshot.
///
/// Only conflicts are retried, at most [`MAX_CONFLICT_RETRIES`] times.
pub(crate) fn retry_on_conflict<T>(
    result: &ContentResult<T>,
    attempt: &mut u32,
    operation: &'static str,
) -> bool {
    let Err(ContentError::Conflict(reason)) = result else {
        return false;
    };
    if *attempt >= MAX_CONFLICT_RETRIES {
        return false;
    }
    *attempt += 1;
    debug!(operation, attempt = *attempt, reason = %reason, "retrying after conflict");
    true
}

/// Reject blank titles.
pub(crate) fn validate_title(title: &str) -> ContentResult<String> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(ContentError::Validation("title must not be blank".to_string()));
    }
    Ok(trimmed.to_string())
}
