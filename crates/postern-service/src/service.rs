use std::sync::Arc;

use postern_core::{codegen, DeleteRequest, Result, Store, StoreError, UrlRecord};
use tracing::{debug, info};

use crate::batch::{BatchWriter, NewMapping, PartialWrite};
use crate::pipeline::{Cancellation, DeletePipeline, DeleteReport};

/// Stateless orchestrator over one `Store` handle.
///
/// Composes the code generator, batch writer, and deletion pipeline into
/// the operations external callers use. The store is owned explicitly
/// and passed by handle; nothing here keeps state of its own.
#[derive(Debug)]
pub struct MappingService<S> {
    store: Arc<S>,
    writer: BatchWriter<S>,
    pipeline: DeletePipeline<S>,
    code_length: usize,
}

impl<S: Store> MappingService<S> {
    /// Creates a service over `store` with the default chunk size,
    /// worker count, and code length.
    pub fn new(store: S) -> Self {
        Self::with_store(Arc::new(store))
    }

    /// Creates a service over an already shared store handle.
    pub fn with_store(store: Arc<S>) -> Self {
        let writer = BatchWriter::builder().store(Arc::clone(&store)).build();
        let pipeline = DeletePipeline::builder().store(Arc::clone(&store)).build();
        Self {
            store,
            writer,
            pipeline,
            code_length: codegen::DEFAULT_CODE_LENGTH,
        }
    }

    /// Overrides the generated code length.
    pub fn with_code_length(mut self, code_length: usize) -> Self {
        self.code_length = code_length;
        self.writer = BatchWriter::builder()
            .store(Arc::clone(&self.store))
            .code_length(code_length)
            .build();
        self
    }

    /// Shortens a single URL for `owner`.
    pub async fn create_one(&self, owner: &str, original: &str) -> Result<UrlRecord> {
        if original.is_empty() {
            return Err(StoreError::NoData("original url is empty".into()));
        }
        let record = UrlRecord::new(owner, original, codegen::shorten(original, self.code_length));
        self.store.insert_one(record.clone()).await?;
        debug!(owner, short = %record.short, "mapping created");
        Ok(record)
    }

    /// Shortens a set of URLs for `owner` in bounded chunks; on failure
    /// the committed prefix is reported alongside the error.
    pub async fn create_batch(
        &self,
        owner: &str,
        originals: Vec<String>,
    ) -> std::result::Result<Vec<UrlRecord>, PartialWrite> {
        if originals.is_empty() {
            return Err(PartialWrite {
                committed: Vec::new(),
                source: StoreError::NoData("empty create batch".into()),
            });
        }
        let records = originals
            .into_iter()
            .map(|original| NewMapping::new(owner, original))
            .collect();
        self.writer.write_all(records).await
    }

    /// Resolves a short code to its original URL.
    pub async fn resolve(&self, short: &str) -> Result<String> {
        self.store.select_original(short).await
    }

    /// Lists every live mapping owned by `owner`.
    pub async fn list_owned(&self, owner: &str) -> Result<Vec<UrlRecord>> {
        self.store.select_all(owner).await
    }

    /// Soft-deletes the given short codes on behalf of `owner`.
    ///
    /// Pairs that match no live record are skipped silently; every chunk
    /// is attempted and the first error, if any, is reported.
    pub async fn delete_owned(&self, owner: &str, shorts: Vec<String>) -> Result<DeleteReport> {
        if shorts.is_empty() {
            return Err(StoreError::NoData("empty delete batch".into()));
        }
        let requests: Vec<DeleteRequest> = shorts
            .into_iter()
            .map(|short| DeleteRequest::new(short, owner))
            .collect();
        info!(owner, requests = requests.len(), "bulk delete started");
        self.pipeline.delete_all(requests, Cancellation::new()).await
    }

    /// Probes the storage backend.
    pub async fn ping(&self) -> Result<()> {
        self.store.ping().await
    }

    /// Releases the storage backend. Call exactly once at shutdown.
    pub async fn close(&self) -> Result<()> {
        self.store.close().await
    }

    /// The underlying store handle.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }
}
