//! Batch-to-worker routing.
//!
//! An [`Indexer`] decides which worker owns a batch. It is a pure,
//! deterministic function of the batch so that routing is reproducible in
//! tests, and it must return a value in `[0, workers)`. The scanner checks
//! the bound and fails the run otherwise.

use super::batch::Batch;
use std::fmt;
use tsload_core::Event;
use xxhash_rust::xxh3::xxh3_64;

/// Maps a batch to the index of the worker that must process it.
pub trait Indexer<E>: Send {
    fn index(&self, batch: &Batch<E>) -> usize;
}

/// Routes every batch to worker 0.
#[derive(Debug, Clone, Copy, Default)]
pub struct SingleIndexer;

impl<E> Indexer<E> for SingleIndexer {
    fn index(&self, _batch: &Batch<E>) -> usize {
        0
    }
}

/// Spreads batches over workers by dispatch sequence number.
#[derive(Debug, Clone, Copy)]
pub struct RoundRobinIndexer {
    workers: usize,
}

impl RoundRobinIndexer {
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
        }
    }
}

impl<E> Indexer<E> for RoundRobinIndexer {
    fn index(&self, batch: &Batch<E>) -> usize {
        (batch.seq() % self.workers as u64) as usize
    }
}

/// Routes by the XXH3 hash of the first event's measurement name, so a
/// measurement tends to stay on one worker. The mapping does not depend on
/// the build or the process.
///
/// Empty batches go to worker 0.
#[derive(Debug, Clone, Copy)]
pub struct MeasurementHashIndexer {
    workers: usize,
}

impl MeasurementHashIndexer {
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
        }
    }
}

impl<E: Event> Indexer<E> for MeasurementHashIndexer {
    fn index(&self, batch: &Batch<E>) -> usize {
        match batch.events().first() {
            Some(event) => {
                (xxh3_64(event.measurement().as_bytes()) % self.workers as u64) as usize
            }
            None => 0,
        }
    }
}

/// Named routing strategies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum IndexerKind {
    #[default]
    Single,
    RoundRobin,
    MeasurementHash,
}

impl fmt::Display for IndexerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Single => "single",
            Self::RoundRobin => "round-robin",
            Self::MeasurementHash => "measurement-hash",
        })
    }
}

/// Build the indexer for `kind` over `workers` workers.
pub fn build_indexer<E: Event>(kind: IndexerKind, workers: usize) -> Box<dyn Indexer<E>> {
    match kind {
        IndexerKind::Single => Box::new(SingleIndexer),
        IndexerKind::RoundRobin => Box::new(RoundRobinIndexer::new(workers)),
        IndexerKind::MeasurementHash => Box::new(MeasurementHashIndexer::new(workers)),
    }
}
