use thiserror::Error;

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors produced at the storage boundary.
///
/// Backends translate engine-specific failures into these kinds, so the
/// layers above never see a backend-specific representation. The message
/// payload carries the offending key or the engine's own description.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// A live record with the same original URL or short code exists.
    #[error("record already exists: {0}")]
    AlreadyExists(String),
    /// No record matches the given key.
    #[error("record does not exist: {0}")]
    NotExist(String),
    /// The record matching the key is soft-deleted.
    #[error("record already deleted: {0}")]
    AlreadyDeleted(String),
    /// An operation that requires at least one item received none.
    #[error("no data: {0}")]
    NoData(String),
    /// A delete targeted rows that matched no live record.
    #[error("no matching live record: {0}")]
    NotFound(String),
    /// The backend has no meaningful liveness probe.
    #[error("operation not supported: {0}")]
    Unsupported(String),
    /// The backend is unreachable or its resources are gone.
    #[error("backend unavailable: {0}")]
    Unavailable(String),
    /// The operation was cancelled before completion.
    #[error("operation cancelled: {0}")]
    Cancelled(String),
    /// Stored data could not be decoded.
    #[error("stored data is invalid: {0}")]
    InvalidData(String),
    /// The engine rejected the operation for a reason with no dedicated
    /// kind of its own.
    #[error("storage query failed: {0}")]
    Query(String),
}
