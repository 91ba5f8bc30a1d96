//! Load run orchestration.
//!
//! [`Loader::run`] wires one duplex channel and one worker thread per
//! configured worker, drives the scanner on the calling thread, closes every
//! channel once the input is exhausted, and joins all workers before
//! reporting. Any fatal error (decode, store write, worker panic) ends the
//! run; the worker's error is preferred over the scanner's, since a scanner
//! facing a failed worker only sees that the worker is gone.

use crate::config::LoadConfig;
use crate::pipeline::{
    AbortSignal, Pool, PoolStats, Scanner, ScannerEnd, Worker, WorkerStats, build_indexer,
};
use crate::report::{ProgressReporter, rate};
use crate::store::Store;
use crate::{Error, Result};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{error, info};
use tsload_core::{Decoder, Document, MetricCounter};

/// Outcome of a successful run.
#[derive(Debug, Clone)]
pub struct LoadSummary {
    /// Events read from the input.
    pub events: u64,

    /// Batches dispatched.
    pub batches: u64,

    /// Field values transformed.
    pub metrics: u64,

    /// Wall time from first read to last worker exit.
    pub elapsed: Duration,

    /// Per-worker counters, by worker index.
    pub workers: Vec<WorkerStats>,

    /// Document pool counters.
    pub pool: PoolStats,
}

impl LoadSummary {
    pub fn events_per_sec(&self) -> f64 {
        rate(self.events, self.elapsed.as_secs_f64())
    }

    pub fn metrics_per_sec(&self) -> f64 {
        rate(self.metrics, self.elapsed.as_secs_f64())
    }

    /// Successful bulk writes across all workers.
    pub fn bulk_writes(&self) -> u64 {
        self.workers.iter().map(|w| w.bulk_writes).sum()
    }

    /// Documents accepted by the store across all workers.
    pub fn documents_written(&self) -> u64 {
        self.workers.iter().map(|w| w.documents_written).sum()
    }
}

/// Runs the pipeline against a store.
pub struct Loader<S> {
    config: LoadConfig,
    store: Arc<S>,
    pool: Arc<Pool<Document>>,
    metrics: MetricCounter,
    events: MetricCounter,
}

impl<S: Store + 'static> Loader<S> {
    pub fn new(config: LoadConfig, store: Arc<S>) -> Self {
        Self {
            config,
            store,
            pool: Arc::new(Pool::new()),
            metrics: MetricCounter::new(),
            events: MetricCounter::new(),
        }
    }

    /// Count transformed field values into a caller-owned counter.
    pub fn with_metric_counter(mut self, metrics: MetricCounter) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn config(&self) -> &LoadConfig {
        &self.config
    }

    /// The document pool shared by this loader's workers.
    pub fn pool(&self) -> &Arc<Pool<Document>> {
        &self.pool
    }

    /// Load everything `decoder` yields.
    pub fn run<D>(&self, decoder: &mut D) -> Result<LoadSummary>
    where
        D: Decoder,
    {
        self.config.validate()?;
        let workers = self.config.workers;
        let metrics_before = self.metrics.get();

        info!(
            workers,
            batch_size = self.config.batch_size,
            in_flight = self.config.in_flight,
            indexer = %self.config.indexer,
            load = self.config.do_load,
            "starting load"
        );

        let start = Instant::now();
        let abort = AbortSignal::new();
        let mut channels = Vec::with_capacity(workers);
        let mut handles = Vec::with_capacity(workers);

        for w in 0..workers {
            let (scanner_end, worker_end) = abort.duplex(w, self.config.in_flight);
            channels.push(scanner_end);

            let store = self.config.do_load.then(|| Arc::clone(&self.store));
            let pool = Arc::clone(&self.pool);
            let metrics = self.metrics.clone();
            let events = self.events.clone();

            let spawned = thread::Builder::new()
                .name(format!("tsload-worker-{w}"))
                .spawn(move || -> Result<WorkerStats> {
                    let writer = match store {
                        Some(store) => Some(store.session()?),
                        None => None,
                    };
                    Worker::new(worker_end, pool, metrics, writer)
                        .with_event_counter(events)
                        .run()
                });

            match spawned {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    abandon(channels, handles);
                    return Err(e.into());
                }
            }
        }

        let reporter = if self.config.reporting_period.is_zero() {
            None
        } else {
            match ProgressReporter::spawn(
                self.config.reporting_period,
                self.events.clone(),
                self.metrics.clone(),
            ) {
                Ok(reporter) => Some(reporter),
                Err(e) => {
                    abandon(channels, handles);
                    return Err(e.into());
                }
            }
        };

        let mut scanner = Scanner::new(channels, build_indexer(self.config.indexer, workers));
        let scanned = scanner.scan(self.config.batch_size, decoder, self.config.limit);
        let batches = scanner.batches();
        scanner.close();

        let mut worker_stats = Vec::with_capacity(workers);
        let mut worker_error = None;
        for (w, handle) in handles.into_iter().enumerate() {
            match handle.join() {
                Ok(Ok(stats)) => worker_stats.push(stats),
                Ok(Err(e)) => {
                    error!(worker = w, "worker failed: {}", e);
                    worker_error.get_or_insert(e);
                }
                Err(_) => {
                    error!(worker = w, "worker panicked");
                    worker_error.get_or_insert(Error::WorkerPanic(w));
                }
            }
        }

        if let Some(reporter) = reporter {
            reporter.stop();
        }

        if let Some(e) = worker_error {
            return Err(e);
        }
        let events = scanned?;

        let summary = LoadSummary {
            events,
            batches,
            metrics: self.metrics.get() - metrics_before,
            elapsed: start.elapsed(),
            workers: worker_stats,
            pool: self.pool.stats(),
        };

        info!(
            events = summary.events,
            batches = summary.batches,
            metrics = summary.metrics,
            elapsed_secs = summary.elapsed.as_secs_f64(),
            "load complete"
        );
        Ok(summary)
    }
}

/// Hang up on already-started workers and wait for them to exit.
fn abandon<E>(channels: Vec<ScannerEnd<E>>, handles: Vec<JoinHandle<Result<WorkerStats>>>) {
    drop(channels);
    for handle in handles {
        let _ = handle.join();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::IndexerKind;
    use crate::pipeline::testing::{FailingDecoder, VecDecoder, points};
    use crate::store::{MemoryStore, Store};
    use std::collections::HashSet;
    use std::io::Cursor;
    use tsload_core::{JsonlDecoder, Point};

    fn config(batch_size: usize, workers: usize) -> LoadConfig {
        LoadConfig {
            batch_size,
            workers,
            reporting_period: Duration::ZERO,
            ..LoadConfig::default()
        }
    }

    fn run(
        config: LoadConfig,
        store: &MemoryStore,
        events: Vec<Point>,
    ) -> (Loader<MemoryStore>, Result<LoadSummary>) {
        let loader = Loader::new(config, Arc::new(store.clone()));
        let mut decoder = VecDecoder::new(events);
        let result = loader.run(&mut decoder);
        (loader, result)
    }

    // =========================================================================
    // End-to-end scenarios
    // =========================================================================

    #[test]
    fn test_ten_events_in_three_batches() {
        let store = MemoryStore::new();
        let (_, result) = run(config(4, 1), &store, points(10));
        let summary = result.unwrap();

        assert_eq!(summary.events, 10);
        assert_eq!(summary.batches, 3);
        assert_eq!(summary.metrics, 20);
        assert_eq!(summary.bulk_writes(), 3);
        assert_eq!(summary.documents_written(), 10);
        assert_eq!(store.batch_sizes(), vec![4, 4, 2]);
        assert_eq!(store.sessions(), 1);
    }

    #[test]
    fn test_dry_run() {
        let store = MemoryStore::new();
        let cfg = LoadConfig {
            do_load: false,
            ..config(5, 1)
        };
        let (loader, result) = run(cfg, &store, points(5));
        let summary = result.unwrap();

        assert_eq!(summary.batches, 1);
        assert_eq!(summary.workers[0].batches, 1);
        assert_eq!(summary.bulk_writes(), 0);
        assert_eq!(store.write_attempts(), 0);
        assert_eq!(store.sessions(), 0);
        assert_eq!(summary.pool.released, 5);
        assert_eq!(loader.pool().idle(), 5);
    }

    #[test]
    fn test_write_failure_fails_run() {
        let store = MemoryStore::fail_on_write(0);
        let (_, result) = run(config(4, 1), &store, points(10));

        match result.unwrap_err() {
            Error::Store { worker, batch, .. } => {
                assert_eq!(worker, 0);
                assert_eq!(batch, 0);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(store.write_attempts(), 1);
        assert_eq!(store.writes(), 0);
    }

    #[test]
    fn test_write_failure_reports_root_cause_with_many_workers() {
        let store = MemoryStore::fail_on_write(0);
        let cfg = LoadConfig {
            indexer: IndexerKind::MeasurementHash,
            ..config(10, 3)
        };
        let (_, result) = run(cfg, &store, points(1_000));

        assert!(matches!(result, Err(Error::Store { .. })));
        assert!(store.write_attempts() < 100);
    }

    #[test]
    fn test_abandon_joins_started_workers() {
        let store = MemoryStore::new();
        let pool = Arc::new(Pool::new());
        let abort = AbortSignal::new();

        let mut channels = Vec::new();
        let mut handles = Vec::new();
        for w in 0..2 {
            let (scanner_end, worker_end) = abort.duplex::<Point>(w, 1);
            channels.push(scanner_end);
            let store = store.clone();
            let pool = Arc::clone(&pool);
            handles.push(thread::spawn(move || -> Result<WorkerStats> {
                let writer = store.session()?;
                Worker::new(worker_end, pool, MetricCounter::new(), Some(writer)).run()
            }));
        }

        abandon(channels, handles);
        assert_eq!(store.sessions(), 2);
        assert_eq!(abort.failed(), None);
    }

    // =========================================================================
    // Properties
    // =========================================================================

    #[test]
    fn test_single_worker_keeps_order() {
        let store = MemoryStore::new();
        let (_, result) = run(config(3, 1), &store, points(30));
        result.unwrap();

        let timestamps: Vec<i64> = store.documents().iter().map(|d| d.timestamp).collect();
        assert_eq!(timestamps, (0..30).collect::<Vec<_>>());
    }

    #[test]
    fn test_many_workers_process_every_event_once() {
        let store = MemoryStore::new();
        let cfg = LoadConfig {
            indexer: IndexerKind::RoundRobin,
            ..config(7, 4)
        };
        let (_, result) = run(cfg, &store, points(500));
        let summary = result.unwrap();

        assert_eq!(summary.events, 500);
        assert_eq!(summary.batches, 72);
        assert_eq!(summary.workers.len(), 4);
        assert_eq!(store.sessions(), 4);
        for stats in &summary.workers {
            assert!(stats.batches >= 18, "worker {} starved", stats.worker);
        }

        let timestamps: HashSet<i64> = store.documents().iter().map(|d| d.timestamp).collect();
        assert_eq!(timestamps.len(), 500);
        assert_eq!(summary.documents_written(), 500);
    }

    #[test]
    fn test_measurement_hash_keeps_measurement_on_one_worker() {
        let store = MemoryStore::new();
        let cfg = LoadConfig {
            indexer: IndexerKind::MeasurementHash,
            ..config(1, 3)
        };
        let (_, result) = run(cfg, &store, points(60));
        let summary = result.unwrap();
        assert_eq!(summary.events, 60);
        assert_eq!(
            summary.workers.iter().map(|w| w.events).sum::<u64>(),
            60
        );
    }

    #[test]
    fn test_scanner_waits_for_slow_worker() {
        // Each write takes 20ms. If the scanner ran ahead, it would be
        // reading batch `b` while fewer than `b - 1` writes had finished.
        struct WriteAwareDecoder {
            inner: VecDecoder,
            store: MemoryStore,
            read: u64,
            batch_size: u64,
            violations: u64,
        }

        impl Decoder for WriteAwareDecoder {
            type Event = Point;

            fn next_event(&mut self) -> tsload_core::Result<Option<Point>> {
                let batch = self.read / self.batch_size;
                if (self.store.writes() as u64) < batch.saturating_sub(1) {
                    self.violations += 1;
                }
                self.read += 1;
                self.inner.next_event()
            }
        }

        let store = MemoryStore::with_write_delay(Duration::from_millis(20));
        let loader = Loader::new(config(2, 1), Arc::new(store.clone()));
        let mut decoder = WriteAwareDecoder {
            inner: VecDecoder::new(points(16)),
            store: store.clone(),
            read: 0,
            batch_size: 2,
            violations: 0,
        };

        let summary = loader.run(&mut decoder).unwrap();
        assert_eq!(summary.batches, 8);
        assert_eq!(decoder.violations, 0);
    }

    #[test]
    fn test_limit() {
        let store = MemoryStore::new();
        let cfg = LoadConfig {
            limit: Some(9),
            ..config(4, 1)
        };
        let (_, result) = run(cfg, &store, points(100));
        let summary = result.unwrap();
        assert_eq!(summary.events, 9);
        assert_eq!(store.batch_sizes(), vec![4, 4, 1]);
    }

    #[test]
    fn test_decode_failure_fails_run_after_draining() {
        let store = MemoryStore::new();
        let loader = Loader::new(config(4, 1), Arc::new(store.clone()));
        let mut decoder = FailingDecoder::new(points(20), 9);

        let err = loader.run(&mut decoder).unwrap_err();
        assert!(matches!(err, Error::Core(tsload_core::Error::Decode { .. })));
        // Batches dispatched before the failure were still written.
        assert_eq!(store.batch_sizes(), vec![4, 4]);
    }

    #[test]
    fn test_invalid_config_rejected_before_start() {
        let store = MemoryStore::new();
        let (_, result) = run(config(0, 1), &store, points(3));
        assert!(matches!(result, Err(Error::Config(_))));
        assert_eq!(store.sessions(), 0);
    }

    #[test]
    fn test_external_metric_counter() {
        let store = MemoryStore::new();
        let counter = MetricCounter::new();
        counter.add(100);
        let loader =
            Loader::new(config(4, 2), Arc::new(store)).with_metric_counter(counter.clone());

        let summary = loader.run(&mut VecDecoder::new(points(8))).unwrap();
        assert_eq!(counter.get(), 116);
        assert_eq!(summary.metrics, 16);
    }

    #[test]
    fn test_jsonl_input() {
        let input = (0..6)
            .map(|i| {
                format!(
                    r#"{{"measurement":"cpu","timestamp":{i},"tags":[["hostname","host_{i}"]],"fields":[["usage_user",{i}],["usage_idle",1.5],["usage_nice",0]]}}"#
                )
            })
            .collect::<Vec<_>>()
            .join("\n");

        let store = MemoryStore::new();
        let loader = Loader::new(config(4, 1), Arc::new(store.clone()));
        let summary = loader.run(&mut JsonlDecoder::new(Cursor::new(input))).unwrap();

        assert_eq!(summary.events, 6);
        assert_eq!(summary.metrics, 18);
        assert_eq!(store.batch_sizes(), vec![4, 2]);
        assert_eq!(store.documents()[5].tags["hostname"], "host_5");
    }

    #[test]
    fn test_summary_rates() {
        let summary = LoadSummary {
            events: 1_000,
            batches: 10,
            metrics: 10_000,
            elapsed: Duration::from_secs(2),
            workers: vec![],
            pool: PoolStats::default(),
        };
        assert_eq!(summary.events_per_sec(), 500.0);
        assert_eq!(summary.metrics_per_sec(), 5_000.0);
    }
}
