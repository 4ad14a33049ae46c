use serde::{Deserialize, Serialize};

/// A stored URL mapping.
///
/// Records are only ever created and soft-deleted: `owner` and
/// `original` never change after insertion, and `deleted` flips from
/// false to true exactly once. Soft-deleted records are retained by the
/// backend but invisible to reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlRecord {
    /// Opaque user identifier assigned by an external identity layer.
    pub owner: String,
    /// The long URL, stored as-is (no normalization).
    pub original: String,
    /// The derived short code.
    pub short: String,
    /// Soft-delete flag.
    #[serde(default)]
    pub deleted: bool,
}

impl UrlRecord {
    /// Creates a live record.
    pub fn new(
        owner: impl Into<String>,
        original: impl Into<String>,
        short: impl Into<String>,
    ) -> Self {
        Self {
            owner: owner.into(),
            original: original.into(),
            short: short.into(),
            deleted: false,
        }
    }

    /// Whether the record is visible to reads.
    pub fn is_live(&self) -> bool {
        !self.deleted
    }
}

/// One unit of a bulk deletion: the short code to remove and the owner
/// asserting the removal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeleteRequest {
    pub short: String,
    pub owner: String,
}

impl DeleteRequest {
    pub fn new(short: impl Into<String>, owner: impl Into<String>) -> Self {
        Self {
            short: short.into(),
            owner: owner.into(),
        }
    }
}
