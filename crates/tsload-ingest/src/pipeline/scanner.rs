//! Scanner: the single reader of the input stream.
//!
//! The scanner pulls events from a [`Decoder`], groups them into batches of
//! at most `batch_size` events, asks the [`Indexer`] which worker owns each
//! batch, and submits it on that worker's duplex channel. Submission blocks
//! while the worker is busy, which is what keeps a fast input from running
//! ahead of the store.
//!
//! Memory stays bounded: the scanner holds one filling batch, plus at most
//! `in_flight` submitted batches per worker.

use super::batch::Batch;
use super::duplex::ScannerEnd;
use super::indexer::Indexer;
use crate::{Error, Result};
use std::mem;
use tracing::{debug, info};
use tsload_core::{Decoder, Event};

/// Reads, batches and dispatches events.
pub struct Scanner<E> {
    channels: Vec<ScannerEnd<E>>,
    indexer: Box<dyn Indexer<E>>,
    batches: u64,
}

impl<E: Event> Scanner<E> {
    /// Create a scanner over one channel per worker.
    ///
    /// `channels[i]` must lead to worker `i`.
    pub fn new(channels: Vec<ScannerEnd<E>>, indexer: Box<dyn Indexer<E>>) -> Self {
        Self {
            channels,
            indexer,
            batches: 0,
        }
    }

    /// Read the stream to exhaustion (or `limit` events) and dispatch it.
    ///
    /// Returns the number of events scanned. A decode failure aborts the
    /// scan; batches already submitted stay with their workers.
    pub fn scan<D>(&mut self, batch_size: usize, decoder: &mut D, limit: Option<u64>) -> Result<u64>
    where
        D: Decoder<Event = E>,
    {
        if batch_size == 0 {
            return Err(Error::Config("batch size must be at least 1".to_string()));
        }
        if self.channels.is_empty() {
            return Err(Error::Config("scanner has no worker channels".to_string()));
        }

        let mut scanned: u64 = 0;
        let mut filling: Vec<E> = Vec::with_capacity(batch_size);

        while limit.is_none_or(|limit| scanned < limit) {
            let Some(event) = decoder.next_event()? else {
                break;
            };
            scanned += 1;
            filling.push(event);

            if filling.len() >= batch_size {
                let events = mem::replace(&mut filling, Vec::with_capacity(batch_size));
                self.dispatch(events)?;
            }
        }

        if !filling.is_empty() {
            self.dispatch(filling)?;
        }

        info!(events = scanned, batches = self.batches, "scan complete");
        Ok(scanned)
    }

    fn dispatch(&mut self, events: Vec<E>) -> Result<()> {
        let batch = Batch::new(self.batches, events);
        let index = self.indexer.index(&batch);
        let workers = self.channels.len();
        let channel = self
            .channels
            .get(index)
            .ok_or(Error::InvalidIndex { index, workers })?;

        let len = batch.len() as u64;
        debug!(batch = batch.seq(), worker = index, events = len, "dispatching batch");
        channel.submit(batch)?;

        self.batches += 1;
        metrics::counter!("load_batches_total").increment(1);
        metrics::counter!("load_events_total").increment(len);
        Ok(())
    }

    /// Number of batches dispatched so far.
    pub fn batches(&self) -> u64 {
        self.batches
    }

    /// Number of worker channels.
    pub fn workers(&self) -> usize {
        self.channels.len()
    }

    /// Close every channel. Workers finish their queued batches and exit.
    pub fn close(self) {
        for channel in self.channels {
            channel.close();
        }
    }
}
