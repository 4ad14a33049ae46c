use std::sync::Arc;

use postern_core::{codegen, Store, StoreError, UrlRecord};
use thiserror::Error;
use tracing::debug;
use typed_builder::TypedBuilder;

/// Maximum records submitted to the store in one `insert_batch` call.
pub const DEFAULT_CHUNK_SIZE: usize = 1000;

/// An insert that has not yet been assigned a short code.
#[derive(Debug, Clone)]
pub struct NewMapping {
    pub owner: String,
    pub original: String,
}

impl NewMapping {
    pub fn new(owner: impl Into<String>, original: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            original: original.into(),
        }
    }
}

/// A batch write that failed partway through.
///
/// `committed` holds the records durably written by the chunks that
/// succeeded before the failing one; the caller decides whether to retry
/// the remaining tail.
#[derive(Debug, Error)]
#[error("batch write failed after {} committed records: {source}", .committed.len())]
pub struct PartialWrite {
    pub committed: Vec<UrlRecord>,
    #[source]
    pub source: StoreError,
}

/// Splits arbitrarily large insert sets into bounded chunks, so no
/// single store call grows an unbounded transaction or buffers the whole
/// input.
#[derive(Debug, TypedBuilder)]
pub struct BatchWriter<S> {
    store: Arc<S>,
    #[builder(default = DEFAULT_CHUNK_SIZE)]
    chunk_size: usize,
    #[builder(default = codegen::DEFAULT_CODE_LENGTH)]
    code_length: usize,
}

impl<S: Store> BatchWriter<S> {
    /// Assigns a short code to every record and writes the set in
    /// submission order, one `insert_batch` call per chunk. The last
    /// chunk may be smaller than the limit.
    ///
    /// Stops at the first failing chunk and reports it together with the
    /// records committed by the chunks before it.
    pub async fn write_all(
        &self,
        records: Vec<NewMapping>,
    ) -> Result<Vec<UrlRecord>, PartialWrite> {
        let total_chunks = records.len().div_ceil(self.chunk_size);
        let mut committed = Vec::with_capacity(records.len());

        for (index, chunk) in records.chunks(self.chunk_size).enumerate() {
            let assigned: Vec<UrlRecord> = chunk
                .iter()
                .map(|mapping| {
                    UrlRecord::new(
                        mapping.owner.clone(),
                        mapping.original.clone(),
                        codegen::shorten(&mapping.original, self.code_length),
                    )
                })
                .collect();

            debug!(
                chunk = index + 1,
                total = total_chunks,
                rows = assigned.len(),
                "writing insert chunk"
            );

            if let Err(source) = self.store.insert_batch(assigned.clone()).await {
                return Err(PartialWrite { committed, source });
            }
            committed.extend(assigned);
        }

        Ok(committed)
    }
}
