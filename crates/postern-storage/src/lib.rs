//! Storage backends for the postern URL shortener.
//!
//! Three interchangeable implementations of the [`Store`] contract:
//! [`MemoryStore`] (process lifetime, no persistence), [`JournalStore`]
//! (append-only JSONL log replayed on open), and [`SqliteStore`]
//! (transactional SQL via sqlx).
//!
//! [`Store`]: postern_core::Store

pub mod journal;
pub mod memory;
pub mod sqlite;

pub use journal::JournalStore;
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
