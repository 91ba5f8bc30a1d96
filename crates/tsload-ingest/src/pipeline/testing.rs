//! Test doubles shared by the pipeline tests.

use super::duplex::WorkerEnd;
use std::collections::VecDeque;
use std::thread::{self, JoinHandle};
use tsload_core::{Decoder, Point};

const MEASUREMENTS: &[&str] = &["cpu", "mem", "disk"];

/// `n` distinct points with two fields and one tag each.
pub(crate) fn points(n: usize) -> Vec<Point> {
    (0..n)
        .map(|i| {
            Point::new(MEASUREMENTS[i % MEASUREMENTS.len()], i as i64)
                .with_tag("hostname", format!("host_{}", i % 4))
                .with_field("usage_user", i as i64)
                .with_field("usage_idle", 0.5)
        })
        .collect()
}

/// Decoder over an in-memory list of points.
pub(crate) struct VecDecoder {
    events: VecDeque<Point>,
}

impl VecDecoder {
    pub(crate) fn new(events: Vec<Point>) -> Self {
        Self {
            events: events.into(),
        }
    }

    pub(crate) fn remaining(&self) -> usize {
        self.events.len()
    }
}

impl Decoder for VecDecoder {
    type Event = Point;

    fn next_event(&mut self) -> tsload_core::Result<Option<Point>> {
        Ok(self.events.pop_front())
    }
}

/// Decoder that fails after yielding `fail_after` events.
pub(crate) struct FailingDecoder {
    inner: VecDecoder,
    fail_after: u64,
    read: u64,
}

impl FailingDecoder {
    pub(crate) fn new(events: Vec<Point>, fail_after: u64) -> Self {
        Self {
            inner: VecDecoder::new(events),
            fail_after,
            read: 0,
        }
    }
}

impl Decoder for FailingDecoder {
    type Event = Point;

    fn next_event(&mut self) -> tsload_core::Result<Option<Point>> {
        if self.read == self.fail_after {
            return Err(tsload_core::Error::Decode {
                line: self.read + 1,
                reason: "injected decode failure".to_string(),
            });
        }
        self.read += 1;
        self.inner.next_event()
    }
}

/// Minimal worker that records `(seq, len)` of every batch it receives.
pub(crate) struct Collector {
    handle: JoinHandle<Vec<(u64, usize)>>,
}

impl Collector {
    pub(crate) fn spawn(end: WorkerEnd<Point>) -> Self {
        let handle = thread::spawn(move || {
            let mut seen = Vec::new();
            while let Some(batch) = end.recv() {
                seen.push((batch.seq(), batch.len()));
                end.done().unwrap();
            }
            seen
        });
        Self { handle }
    }

    pub(crate) fn join(self) -> Vec<(u64, usize)> {
        self.handle.join().unwrap()
    }
}
