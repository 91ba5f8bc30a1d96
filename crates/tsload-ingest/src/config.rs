//! Load run configuration.

use crate::pipeline::IndexerKind;
use crate::{Error, Result};
use std::time::Duration;
use tsload_core::{DEFAULT_BATCH_SIZE, DEFAULT_IN_FLIGHT};

/// Parameters of one load run.
#[derive(Debug, Clone)]
pub struct LoadConfig {
    /// Events per batch (and per bulk write).
    pub batch_size: usize,

    /// Number of worker threads, one duplex channel each.
    pub workers: usize,

    /// Batches a worker may hold before the scanner blocks on it.
    pub in_flight: usize,

    /// Batch routing strategy.
    pub indexer: IndexerKind,

    /// Write to the store. When false documents are built and discarded.
    pub do_load: bool,

    /// Stop after this many events.
    pub limit: Option<u64>,

    /// Interval between progress reports. Zero disables them.
    pub reporting_period: Duration,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            workers: 1,
            in_flight: DEFAULT_IN_FLIGHT,
            indexer: IndexerKind::Single,
            do_load: true,
            limit: None,
            reporting_period: Duration::from_secs(10),
        }
    }
}

impl LoadConfig {
    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(Error::Config("batch size must be at least 1".to_string()));
        }
        if self.workers == 0 {
            return Err(Error::Config("at least one worker is required".to_string()));
        }
        if self.in_flight == 0 {
            return Err(Error::Config(
                "in-flight batches per worker must be at least 1".to_string(),
            ));
        }
        if self.indexer == IndexerKind::Single && self.workers > 1 {
            tracing::warn!(
                workers = self.workers,
                "single indexer routes every batch to worker 0; other workers will stay idle"
            );
        }
        Ok(())
    }
}
