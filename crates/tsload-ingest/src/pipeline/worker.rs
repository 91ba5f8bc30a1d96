//! Worker: turns batches into documents and writes them.
//!
//! Each worker runs on its own thread and owns one duplex channel end and
//! (when loading) one store session. Per batch it:
//!
//! 1. acquires a pooled [`Document`] per event and overwrites it,
//! 2. adds the batch's field-value count to the shared [`MetricCounter`],
//! 3. issues one bulk write for the whole batch (skipped in dry-run mode),
//! 4. returns every document to the pool,
//! 5. signals `done` so the scanner may submit the next batch.
//!
//! A failed bulk write ends the worker with an error and no `done` signal.

use super::batch::Batch;
use super::duplex::WorkerEnd;
use super::pool::Pool;
use crate::store::BulkWriter;
use crate::{Error, Result};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info};
use tsload_core::{Document, Event, MetricCounter};

/// Counters for one worker's run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    /// Worker index.
    pub worker: usize,

    /// Batches fully processed (equals `done` signals sent).
    pub batches: u64,

    /// Events transformed into documents.
    pub events: u64,

    /// Field values transformed.
    pub metrics: u64,

    /// Successful bulk writes.
    pub bulk_writes: u64,

    /// Documents accepted by the store.
    pub documents_written: u64,
}

/// Consumer side of the pipeline.
pub struct Worker<E, W> {
    port: WorkerEnd<E>,
    pool: Arc<Pool<Document>>,
    metrics: MetricCounter,
    events: Option<MetricCounter>,
    writer: Option<W>,
    documents: Vec<Document>,
}

impl<E: Event, W: BulkWriter> Worker<E, W> {
    /// Create a worker.
    ///
    /// `writer == None` is dry-run mode: documents are built and recycled but
    /// never written.
    pub fn new(
        port: WorkerEnd<E>,
        pool: Arc<Pool<Document>>,
        metrics: MetricCounter,
        writer: Option<W>,
    ) -> Self {
        Self {
            port,
            pool,
            metrics,
            events: None,
            writer,
            documents: Vec::new(),
        }
    }

    /// Also count transformed events into `counter`.
    pub fn with_event_counter(mut self, counter: MetricCounter) -> Self {
        self.events = Some(counter);
        self
    }

    /// Process batches until the scanner closes the channel.
    pub fn run(mut self) -> Result<WorkerStats> {
        let worker = self.port.worker();
        let mut stats = WorkerStats {
            worker,
            ..WorkerStats::default()
        };
        info!(worker, load = self.writer.is_some(), "worker started");

        while let Some(batch) = self.port.recv() {
            self.process(batch, &mut stats)?;
            self.port.done()?;
            stats.batches += 1;
            metrics::counter!("worker_batches_total").increment(1);
        }

        info!(
            worker,
            batches = stats.batches,
            events = stats.events,
            "worker finished"
        );
        Ok(stats)
    }

    fn process(&mut self, batch: Batch<E>, stats: &mut WorkerStats) -> Result<()> {
        let worker = self.port.worker();
        let seq = batch.seq();
        let len = batch.len() as u64;

        let mut metric_count = 0u64;
        self.documents.reserve(batch.len());
        for event in batch.events() {
            let mut doc = self.pool.acquire();
            metric_count += doc.overwrite_from(event) as u64;
            self.documents.push(doc);
        }
        drop(batch);

        self.metrics.add(metric_count);
        if let Some(events) = &self.events {
            events.add(len);
        }
        metrics::counter!("worker_metrics_total").increment(metric_count);
        stats.events += len;
        stats.metrics += metric_count;

        let written = match self.writer.as_mut() {
            Some(writer) => {
                let start = Instant::now();
                let result = writer.bulk_write(&self.documents);
                metrics::histogram!("store_bulk_write_duration_seconds")
                    .record(start.elapsed().as_secs_f64());
                Some(result)
            }
            None => None,
        };

        // Documents go back on the failure path too, so the pool never starves.
        self.pool.release_all(self.documents.drain(..));

        match written {
            None => {
                debug!(worker, batch = seq, events = len, "batch transformed (dry run)");
                Ok(())
            }
            Some(Ok(count)) => {
                stats.bulk_writes += 1;
                stats.documents_written += count;
                metrics::counter!("store_documents_written_total").increment(count);
                debug!(worker, batch = seq, documents = count, "batch written");
                Ok(())
            }
            Some(Err(e)) => {
                metrics::counter!("store_write_errors_total").increment(1);
                error!(worker, batch = seq, events = len, "bulk write failed: {}", e);
                Err(Error::Store {
                    worker,
                    batch: seq,
                    reason: e.to_string(),
                })
            }
        }
    }
}
