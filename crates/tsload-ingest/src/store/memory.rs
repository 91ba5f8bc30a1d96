//! In-memory store.
//!
//! Keeps a copy of every successfully written batch. Used as the store test
//! double: it can slow down or fail a chosen bulk write.

use super::{BulkWriter, Store};
use crate::{Error, Result};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;
use tsload_core::Document;

#[derive(Default)]
struct Inner {
    batches: Mutex<Vec<Vec<Document>>>,
    attempts: AtomicU64,
    sessions: AtomicUsize,
    fail_on: Option<u64>,
    delay: Option<Duration>,
}

/// Store that records written documents in memory.
///
/// Cloning yields another handle on the same recorded data.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the `n`-th bulk write (0-based, counted across all sessions).
    pub fn fail_on_write(n: u64) -> Self {
        Self {
            inner: Arc::new(Inner {
                fail_on: Some(n),
                ..Inner::default()
            }),
        }
    }

    /// Sleep for `delay` inside every bulk write.
    pub fn with_write_delay(delay: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                delay: Some(delay),
                ..Inner::default()
            }),
        }
    }

    /// Bulk writes attempted, including failed ones.
    pub fn write_attempts(&self) -> u64 {
        self.inner.attempts.load(Ordering::Acquire)
    }

    /// Bulk writes that succeeded.
    pub fn writes(&self) -> usize {
        self.inner.batches.lock().len()
    }

    /// Sizes of the successful bulk writes, in completion order.
    pub fn batch_sizes(&self) -> Vec<usize> {
        self.inner.batches.lock().iter().map(Vec::len).collect()
    }

    /// Every document written so far, in completion order.
    pub fn documents(&self) -> Vec<Document> {
        self.inner.batches.lock().iter().flatten().cloned().collect()
    }

    /// Sessions opened so far.
    pub fn sessions(&self) -> usize {
        self.inner.sessions.load(Ordering::Acquire)
    }
}

impl Store for MemoryStore {
    type Writer = MemoryWriter;

    fn session(&self) -> Result<MemoryWriter> {
        self.inner.sessions.fetch_add(1, Ordering::AcqRel);
        Ok(MemoryWriter {
            inner: Arc::clone(&self.inner),
        })
    }
}

/// Session on a [`MemoryStore`].
pub struct MemoryWriter {
    inner: Arc<Inner>,
}

impl BulkWriter for MemoryWriter {
    fn bulk_write(&mut self, documents: &[Document]) -> Result<u64> {
        let attempt = self.inner.attempts.fetch_add(1, Ordering::AcqRel);
        if let Some(delay) = self.inner.delay {
            thread::sleep(delay);
        }
        if self.inner.fail_on == Some(attempt) {
            return Err(Error::Io(std::io::Error::other(format!(
                "injected failure on write {attempt}"
            ))));
        }

        self.inner.batches.lock().push(documents.to_vec());
        Ok(documents.len() as u64)
    }
}
