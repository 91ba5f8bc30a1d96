//! Error types for the load pipeline.

use thiserror::Error;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during a load run.
///
/// Every variant is fatal to the run: nothing in the pipeline retries.
#[derive(Error, Debug)]
pub enum Error {
    /// Input decoding error.
    #[error(transparent)]
    Core(#[from] tsload_core::Error),

    /// ClickHouse error.
    #[error("ClickHouse error: {0}")]
    ClickHouse(#[from] clickhouse::error::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Bulk write rejected by the store.
    #[error("bulk write failed on worker {worker}, batch {batch}: {reason}")]
    Store {
        worker: usize,
        batch: u64,
        reason: String,
    },

    /// A worker exited while the scanner still had work for it.
    #[error("worker {0} is gone")]
    WorkerGone(usize),

    /// An indexer returned an index outside `[0, workers)`.
    #[error("indexer returned {index} for {workers} worker(s)")]
    InvalidIndex { index: usize, workers: usize },

    /// Scanner/worker protocol violation.
    #[error("protocol violation: {0}")]
    Protocol(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A worker thread panicked.
    #[error("worker {0} panicked")]
    WorkerPanic(usize),
}
