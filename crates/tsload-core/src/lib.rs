//! Core types and shared utilities for the tsload benchmark loader.
//!
//! This crate provides:
//! - The input event model ([`Event`], [`FieldValue`], [`Point`])
//! - Input decoding ([`Decoder`], [`JsonlDecoder`])
//! - The per-event storage [`Document`]
//! - Metrics: the explicit [`MetricCounter`] and Prometheus helpers
//! - Shared error types

mod decode;
mod document;
mod error;
mod event;
pub mod metrics;

// ═══════════════════════════════════════════════════════════════════════════
// Constants
// ═══════════════════════════════════════════════════════════════════════════

/// Default number of events per batch.
pub const DEFAULT_BATCH_SIZE: usize = 10_000;

/// Default number of batches a worker may hold before the scanner blocks.
pub const DEFAULT_IN_FLIGHT: usize = 1;

pub use decode::{Decoder, JsonlDecoder};
pub use document::Document;
pub use error::{Error, Result};
pub use event::{Event, FieldValue, Point};
pub use self::metrics::MetricCounter;
