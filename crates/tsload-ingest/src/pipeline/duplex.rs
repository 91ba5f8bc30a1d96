//! Duplex channel between the scanner and one worker.
//!
//! A duplex channel pairs two bounded queues:
//!
//! ```text
//!            work (Batch)
//! Scanner ───────────────────▶ Worker
//!         ◀───────────────────
//!            ready (token)
//! ```
//!
//! The ready queue starts with `in_flight` tokens. [`ScannerEnd::submit`]
//! takes a token before enqueueing a batch and [`WorkerEnd::done`] puts one
//! back after the batch has been written and its documents recycled. A
//! scanner facing a slow worker therefore blocks in `submit` instead of
//! piling up batches; at most `in_flight` batches are outstanding per worker.
//!
//! # States
//!
//! ```text
//! Idle ──submit──▶ Busy ──done──▶ Idle ──close──▶ Closed
//! ```
//!
//! Closing consumes the [`ScannerEnd`], so submit-after-close and
//! double-close cannot be expressed.
//!
//! # Aborting
//!
//! All channels of one run share an [`AbortSignal`]. A [`WorkerEnd`] dropped
//! before its work queue ran dry (store failure, session failure, panic)
//! raises it, and from then on every `submit` on any channel of the run
//! fails with [`Error::WorkerGone`] naming the failed worker.

use super::batch::Batch;
use crate::{Error, Result};
use crossbeam_channel::{Receiver, Sender, TrySendError, bounded, select, unbounded};
use std::cell::Cell;
use std::sync::{Arc, OnceLock};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

/// Observable state of a duplex channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    /// The worker can accept another batch.
    Idle,
    /// Every in-flight slot holds an unfinished batch.
    Busy,
    /// The scanner has closed the channel.
    Closed,
}

/// Counters for one duplex channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChannelStats {
    /// Batches handed to the worker.
    pub submitted: u64,

    /// Ready signals sent back by the worker.
    pub completed: u64,
}

struct Shared {
    worker: usize,
    capacity: usize,
    in_flight: AtomicUsize,
    closed: AtomicBool,
    submitted: AtomicU64,
    completed: AtomicU64,
}

impl Shared {
    fn state(&self) -> ChannelState {
        if self.closed.load(Ordering::Acquire) {
            ChannelState::Closed
        } else if self.in_flight.load(Ordering::Acquire) >= self.capacity {
            ChannelState::Busy
        } else {
            ChannelState::Idle
        }
    }

    fn stats(&self) -> ChannelStats {
        ChannelStats {
            submitted: self.submitted.load(Ordering::Acquire),
            completed: self.completed.load(Ordering::Acquire),
        }
    }
}

/// Failure signal shared by every duplex channel of one run.
#[derive(Clone)]
pub struct AbortSignal {
    inner: Arc<AbortInner>,
}

struct AbortInner {
    failed: OnceLock<usize>,
    // Both ends live here, so the wake-up queue never disconnects.
    wake_tx: Sender<()>,
    wake_rx: Receiver<()>,
}

impl AbortSignal {
    pub fn new() -> Self {
        let (wake_tx, wake_rx) = unbounded();
        Self {
            inner: Arc::new(AbortInner {
                failed: OnceLock::new(),
                wake_tx,
                wake_rx,
            }),
        }
    }

    /// Record `worker` as failed and wake a scanner blocked in `submit`.
    ///
    /// Only the first failure is kept.
    pub fn raise(&self, worker: usize) {
        if self.inner.failed.set(worker).is_ok() {
            let _ = self.inner.wake_tx.send(());
            tracing::warn!(worker, "worker failed, aborting run");
        }
    }

    /// The first worker that failed, if any.
    pub fn failed(&self) -> Option<usize> {
        self.inner.failed.get().copied()
    }

    /// Create a duplex channel for worker `worker` tied to this signal,
    /// allowing `in_flight` outstanding batches (values below 1 are raised
    /// to 1).
    pub fn duplex<E>(&self, worker: usize, in_flight: usize) -> (ScannerEnd<E>, WorkerEnd<E>) {
        new_duplex(worker, in_flight, self.clone())
    }
}

impl Default for AbortSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Create a stand-alone duplex channel for worker `worker` allowing
/// `in_flight` outstanding batches (values below 1 are raised to 1).
pub fn duplex<E>(worker: usize, in_flight: usize) -> (ScannerEnd<E>, WorkerEnd<E>) {
    new_duplex(worker, in_flight, AbortSignal::new())
}

fn new_duplex<E>(
    worker: usize,
    in_flight: usize,
    abort: AbortSignal,
) -> (ScannerEnd<E>, WorkerEnd<E>) {
    let capacity = in_flight.max(1);
    let (work_tx, work_rx) = bounded(capacity);
    let (ready_tx, ready_rx) = bounded(capacity);
    for _ in 0..capacity {
        ready_tx
            .try_send(())
            .expect("ready queue holds exactly `capacity` tokens");
    }

    let shared = Arc::new(Shared {
        worker,
        capacity,
        in_flight: AtomicUsize::new(0),
        closed: AtomicBool::new(false),
        submitted: AtomicU64::new(0),
        completed: AtomicU64::new(0),
    });

    (
        ScannerEnd {
            work_tx,
            ready_rx,
            shared: Arc::clone(&shared),
            abort: abort.clone(),
        },
        WorkerEnd {
            work_rx,
            ready_tx,
            shared,
            abort,
            drained: Cell::new(false),
        },
    )
}

/// Scanner side: submits batches, waits for ready tokens.
pub struct ScannerEnd<E> {
    work_tx: Sender<Batch<E>>,
    ready_rx: Receiver<()>,
    shared: Arc<Shared>,
    abort: AbortSignal,
}

impl<E> ScannerEnd<E> {
    /// Hand `batch` to the worker, blocking until it is ready for more work.
    ///
    /// Returns [`Error::WorkerGone`] if this worker has exited, or if any
    /// worker sharing this channel's [`AbortSignal`] has failed. The error
    /// names the failed worker.
    pub fn submit(&self, batch: Batch<E>) -> Result<()> {
        let worker = self.shared.worker;
        if let Some(failed) = self.abort.failed() {
            return Err(Error::WorkerGone(failed));
        }
        select! {
            recv(self.ready_rx) -> token => token.map_err(|_| Error::WorkerGone(worker))?,
            recv(self.abort.inner.wake_rx) -> _ => {
                return Err(Error::WorkerGone(self.abort.failed().unwrap_or(worker)));
            }
        }

        self.shared.in_flight.fetch_add(1, Ordering::AcqRel);
        self.shared.submitted.fetch_add(1, Ordering::AcqRel);

        self.work_tx
            .send(batch)
            .map_err(|_| Error::WorkerGone(worker))
    }

    /// Signal that no further batches will be submitted.
    ///
    /// The worker drains what is already queued and then sees the end of
    /// its work queue.
    pub fn close(self) {
        self.shared.closed.store(true, Ordering::Release);
        tracing::debug!(worker = self.shared.worker, "duplex channel closed");
    }

    /// Index of the worker on the other end.
    pub fn worker(&self) -> usize {
        self.shared.worker
    }

    pub fn state(&self) -> ChannelState {
        self.shared.state()
    }

    pub fn stats(&self) -> ChannelStats {
        self.shared.stats()
    }
}

/// Worker side: receives batches, signals readiness.
pub struct WorkerEnd<E> {
    work_rx: Receiver<Batch<E>>,
    ready_tx: Sender<()>,
    shared: Arc<Shared>,
    abort: AbortSignal,
    drained: Cell<bool>,
}

impl<E> WorkerEnd<E> {
    /// Wait for the next batch.
    ///
    /// Returns `None` once the scanner has closed the channel and every
    /// queued batch has been received.
    pub fn recv(&self) -> Option<Batch<E>> {
        let batch = self.work_rx.recv().ok();
        if batch.is_none() {
            self.drained.set(true);
        }
        batch
    }

    /// Signal that the last received batch is fully processed.
    ///
    /// Must be called exactly once per batch, after the store write and
    /// after the batch's documents went back to the pool.
    pub fn done(&self) -> Result<()> {
        let worker = self.shared.worker;
        self.shared
            .in_flight
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .map_err(|_| {
                Error::Protocol(format!(
                    "worker {worker} signalled done with no outstanding batch"
                ))
            })?;
        self.shared.completed.fetch_add(1, Ordering::AcqRel);

        match self.ready_tx.try_send(()) {
            // A closed scanner no longer needs the token.
            Ok(()) | Err(TrySendError::Disconnected(())) => Ok(()),
            Err(TrySendError::Full(())) => Err(Error::Protocol(format!(
                "worker {worker} ready queue overflow"
            ))),
        }
    }

    /// Index of this worker.
    pub fn worker(&self) -> usize {
        self.shared.worker
    }

    pub fn state(&self) -> ChannelState {
        self.shared.state()
    }

    pub fn stats(&self) -> ChannelStats {
        self.shared.stats()
    }
}

impl<E> Drop for WorkerEnd<E> {
    fn drop(&mut self) {
        if !self.drained.get() {
            self.abort.raise(self.shared.worker);
        }
    }
}
