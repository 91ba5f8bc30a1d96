//! tsload load pipeline.
//!
//! This crate loads decoded time-series events into a backing store as fast
//! as the store accepts them, and measures the rate.
//!
//! # Modules
//!
//! - [`pipeline`] - Scanner, indexers, duplex channels, workers, document pool
//! - [`store`] - Store collaborators (ClickHouse, in-memory)
//! - [`runner`] - Wires a run together and produces a [`LoadSummary`]
//! - [`config`] - Run configuration
//! - [`report`] - Periodic progress logging
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │     Decoder     │  (JSON lines, optionally gzipped)
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │     Scanner     │  Batches events, picks a worker via the Indexer
//! └────────┬────────┘
//!          │ duplex channel per worker (work ▶ / ◀ ready)
//!          ▼
//! ┌─────────────────┐
//! │   Worker × N    │  Pooled documents, one bulk write per batch
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │      Store      │  ClickHouse
//! └─────────────────┘
//! ```

pub mod config;
pub mod error;
pub mod pipeline;
pub mod report;
pub mod runner;
pub mod store;

// Re-export commonly used types at crate root
pub use error::{Error, Result};

pub use config::LoadConfig;
pub use pipeline::{
    AbortSignal, Batch, ChannelState, ChannelStats, Indexer, IndexerKind, Pool, PoolStats, Scanner,
    Worker, WorkerStats, build_indexer, duplex,
};
pub use runner::{LoadSummary, Loader};
pub use store::{BulkWriter, ClickHouseConfig, ClickHouseStore, MemoryStore, Store};
