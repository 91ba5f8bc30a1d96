//! Scan → dispatch → load pipeline.
//!
//! - [`Scanner`] - single reader of the input; groups events into batches
//! - [`Indexer`] - decides which worker owns a batch
//! - [`duplex`] - per-worker channel with one-batch-in-flight backpressure
//! - [`Worker`] - builds documents, bulk-writes them, signals readiness
//! - [`Pool`] - recycles documents across batches and workers
//!
//! # Architecture
//!
//! ```text
//!                         ┌──────────── ready ────────────┐
//!                         ▼                               │
//! [Decoder] → [Scanner] ──┬── work[0] ──▶ [Worker 0] ──▶ [Store]
//!                 │       ├── work[1] ──▶ [Worker 1] ──▶ [Store]
//!             [Indexer]   └── ...                │
//!                                              [Pool]
//! ```
//!
//! Within one channel batches are processed in submission order. Across
//! channels there is no ordering.

mod batch;
pub mod duplex;
mod indexer;
mod pool;
mod scanner;
mod worker;

#[cfg(test)]
pub(crate) mod testing;

pub use batch::Batch;
pub use duplex::{AbortSignal, ChannelState, ChannelStats, ScannerEnd, WorkerEnd, duplex};
pub use indexer::{
    Indexer, IndexerKind, MeasurementHashIndexer, RoundRobinIndexer, SingleIndexer, build_indexer,
};
pub use pool::{Pool, PoolStats};
pub use scanner::Scanner;
pub use worker::{Worker, WorkerStats};
