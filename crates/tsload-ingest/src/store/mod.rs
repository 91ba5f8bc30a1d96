//! Backing-store collaborators.
//!
//! The pipeline talks to a store through two traits:
//!
//! - [`Store`] is shared by the whole run and hands out one session per
//!   worker, the way a database driver hands out cloned connections.
//! - [`BulkWriter`] is that session. A worker owns it exclusively and issues
//!   at most one bulk write at a time.
//!
//! # Available Stores
//!
//! - [`ClickHouseStore`] - one row per document in a MergeTree table
//! - [`MemoryStore`] - keeps written documents in memory (tests, dry runs)

pub mod clickhouse;
pub mod memory;

pub use self::clickhouse::{ClickHouseConfig, ClickHouseStore, ClickHouseWriter, DocumentRow};
pub use self::memory::{MemoryStore, MemoryWriter};

use crate::Result;
use tsload_core::Document;

/// A per-worker store session.
pub trait BulkWriter: Send {
    /// Write every document in one operation.
    ///
    /// Returns the number of documents accepted. Any error means the whole
    /// batch failed.
    fn bulk_write(&mut self, documents: &[Document]) -> Result<u64>;
}

/// A backing store shared by all workers of a run.
pub trait Store: Send + Sync {
    type Writer: BulkWriter + 'static;

    /// Open a session for one worker.
    fn session(&self) -> Result<Self::Writer>;
}
