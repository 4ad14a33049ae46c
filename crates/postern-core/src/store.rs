use crate::error::Result;
use crate::record::{DeleteRequest, UrlRecord};
use async_trait::async_trait;

/// The persistence contract every backend implements.
///
/// A `Store` holds [`UrlRecord`]s and enforces the live-uniqueness
/// invariants: among non-deleted records, no two share an `original` and
/// no two share a `short`. Any type satisfying this trait is
/// interchangeable behind the mapping service, which selects one backend
/// at startup and holds it for the process lifetime.
///
/// Methods that mutate in bulk (`insert_batch`, `delete_batch`) operate
/// on one bounded chunk per call; chunking arbitrarily large inputs is
/// the caller's job. `delete_batch` must tolerate concurrent invocation,
/// because the deletion pipeline calls it from several workers at once.
/// Inserts are issued by a single writer and backends are not required
/// to synchronize the uniqueness check themselves beyond what their
/// engine already provides.
#[async_trait]
pub trait Store: Send + Sync + 'static {
    /// Probes the backend for liveness.
    ///
    /// Backends without an external dependency to reach return
    /// `Unsupported`.
    async fn ping(&self) -> Result<()>;

    /// Inserts a single record.
    ///
    /// Fails with `AlreadyExists` if a live record with the same
    /// `original` or `short` is present; the record is durable before
    /// the call returns success.
    async fn insert_one(&self, record: UrlRecord) -> Result<()>;

    /// Inserts a batch of records with the same uniqueness semantics as
    /// [`insert_one`](Store::insert_one), applied as one unit per call.
    ///
    /// A violation on any row aborts the remaining rows of the call.
    /// Transactional backends make the whole call atomic; the journal
    /// appends sequentially and a mid-batch failure leaves the log
    /// truncated at the last durable record, so the caller must treat
    /// the batch as failed rather than blindly retry the prefix.
    async fn insert_batch(&self, records: Vec<UrlRecord>) -> Result<()>;

    /// Returns the original URL recorded under `short`.
    ///
    /// Fails with `NotExist` for an unknown code and with
    /// `AlreadyDeleted` when the matching record is soft-deleted; the
    /// deleted check takes precedence over returning data.
    async fn select_original(&self, short: &str) -> Result<String>;

    /// Returns the short code of the live record for `original`, or
    /// `NotExist` if no live record matches.
    async fn select_short(&self, original: &str) -> Result<String>;

    /// Returns every live record owned by `owner`, in no particular
    /// order. Unknown owners yield an empty list, never an error.
    async fn select_all(&self, owner: &str) -> Result<Vec<UrlRecord>>;

    /// Soft-deletes each `(short, owner)` pair that matches a live
    /// record; pairs without a live match are skipped silently, since
    /// bulk requests legitimately contain already-deleted or foreign
    /// entries.
    ///
    /// Fails with `NoData` on an empty batch. Submitted pair order is
    /// preserved within the call.
    async fn delete_batch(&self, requests: &[DeleteRequest]) -> Result<()>;

    /// Releases backend resources. Callers invoke this exactly once at
    /// shutdown; calling twice is undefined.
    async fn close(&self) -> Result<()>;
}
