//! Error taxonomy for the ingestion pipeline.
//!
//! Batch operations catch per-item errors at the item boundary and fold them
//! into the failure count; only precondition failures (missing series, missing
//! transcript directory) propagate out of an operation as a whole.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    /// The upstream catalog API rejected or failed a request. Never retried
    /// here; surfaced to the caller of the in-flight listing/fetch.
    #[error("catalog API unavailable: {0}")]
    CatalogUnavailable(String),

    /// Media download or audio extraction failed for one item.
    #[error("media fetch failed for {video_id}: {reason}")]
    FetchFailed { video_id: String, reason: String },

    /// Object-store error other than a clean not-found.
    #[error("object store error: {0}")]
    StoreUnavailable(String),

    /// A local artifact file is malformed for its declared format.
    #[error("invalid artifact: {0}")]
    ValidationFailed(String),

    /// A referenced series or video does not exist.
    #[error("{0} not found")]
    NotFound(String),

    #[error(transparent)]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = SyncError> = std::result::Result<T, E>;
