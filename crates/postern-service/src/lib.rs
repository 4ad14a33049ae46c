//! Mapping service for the postern URL shortener.
//!
//! This crate composes the storage contract into the operations external
//! callers use: the [`BatchWriter`] that bounds insert transactions, the
//! cancellable fan-out/fan-in [`DeletePipeline`] for bulk soft-deletes,
//! and the [`MappingService`] orchestrator tying them together.

pub mod batch;
pub mod pipeline;
pub mod service;

pub use batch::{BatchWriter, NewMapping, PartialWrite};
pub use pipeline::{
    Cancellation, ChunkOutcome, DeletePipeline, DeleteReport, PipelineRun, RunState,
};
pub use service::MappingService;
