//! Unit of work handed from the scanner to a worker.

/// An ordered group of events processed as one store write.
///
/// `seq` is assigned by the scanner in dispatch order, starting at 0.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch<E> {
    seq: u64,
    events: Vec<E>,
}

impl<E> Batch<E> {
    pub fn new(seq: u64, events: Vec<E>) -> Self {
        Self { seq, events }
    }

    /// Dispatch sequence number.
    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn events(&self) -> &[E] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn into_events(self) -> Vec<E> {
        self.events
    }
}
