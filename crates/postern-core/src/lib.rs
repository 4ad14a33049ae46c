//! Core types and traits for the postern URL shortener.
//!
//! This crate provides the persisted record model, the polymorphic
//! [`Store`] contract implemented by every storage backend, the error
//! vocabulary shared across the workspace, and the deterministic
//! short-code generator.

pub mod codegen;
pub mod error;
pub mod record;
pub mod store;

pub use error::{Result, StoreError};
pub use record::{DeleteRequest, UrlRecord};
pub use store::Store;
