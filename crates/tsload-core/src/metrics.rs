//! Metrics for the tsload loader.
//!
//! Two kinds of counters live here:
//!
//! - [`MetricCounter`]: an explicit, cloneable handle on a shared atomic
//!   counter. Workers add the number of field values they transform; the
//!   runner reads it for throughput reporting. Every owner gets its own
//!   handle, so there is no process-wide state and the counter can be
//!   tested in isolation.
//! - Prometheus metrics recorded through the `metrics` facade and served on
//!   an optional `/metrics` endpoint.
//!
//! # Usage
//!
//! ```rust,ignore
//! use tsload_core::metrics::{init_metrics, start_metrics_server};
//!
//! #[tokio::main]
//! async fn main() {
//!     let handle = init_metrics();
//!     start_metrics_server(9091, handle).await.unwrap();
//!
//!     metrics::counter!("load_events_total").increment(1);
//! }
//! ```
//!
//! # Metric Naming Conventions
//!
//! - Prefix: component name (`load_`, `worker_`, `store_`)
//! - Suffix: unit or type (`_total`, `_seconds`)

use axum::{Router, routing::get};
use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

// =============================================================================
// Explicit counters
// =============================================================================

/// Shared counter updated concurrently by workers.
///
/// Cloning yields another handle on the same value.
#[derive(Debug, Clone, Default)]
pub struct MetricCounter {
    value: Arc<AtomicU64>,
}

impl MetricCounter {
    /// Create a counter starting at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically add `n`.
    #[inline]
    pub fn add(&self, n: u64) {
        self.value.fetch_add(n, Ordering::Relaxed);
    }

    /// Current value.
    #[inline]
    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

// =============================================================================
// Prometheus
// =============================================================================

/// Initialize the Prometheus metrics recorder.
///
/// This must be called once at startup before any metrics are recorded.
/// Returns a handle that can be used with [`start_metrics_server`].
///
/// # Panics
///
/// Panics if called more than once (the recorder can only be installed once).
pub fn init_metrics() -> PrometheusHandle {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus recorder");

    register_load_metrics();

    handle
}

/// Try to initialize the Prometheus metrics recorder.
///
/// Like [`init_metrics`] but returns `None` if the recorder is already installed.
pub fn try_init_metrics() -> Option<PrometheusHandle> {
    let handle = PrometheusBuilder::new().install_recorder().ok()?;
    register_load_metrics();
    Some(handle)
}

/// Start the Prometheus metrics HTTP server.
///
/// Binds `0.0.0.0:port`, then serves `/metrics` from a background task and
/// returns immediately.
pub async fn start_metrics_server(
    port: u16,
    handle: PrometheusHandle,
) -> Result<(), std::io::Error> {
    let app = Router::new().route(
        "/metrics",
        get(move || {
            let handle = handle.clone();
            async move { handle.render() }
        }),
    );

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Metrics server listening on http://{}/metrics", addr);

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!("Metrics server stopped: {}", e);
        }
    });

    Ok(())
}

/// Register descriptions for the metrics recorded by the loader.
fn register_load_metrics() {
    // =========================================================================
    // Scanner
    // =========================================================================

    describe_counter!("load_events_total", "Events read from the input stream");
    describe_counter!("load_batches_total", "Batches dispatched to workers");
    describe_gauge!("load_events_per_second", "Mean load rate over the run (events/sec)");
    describe_gauge!(
        "load_metrics_per_second",
        "Mean load rate over the run (field values/sec)"
    );
    describe_gauge!("load_running", "Whether a load is in progress (1=yes, 0=no)");

    // =========================================================================
    // Workers
    // =========================================================================

    describe_counter!("worker_batches_total", "Batches fully processed by workers");
    describe_counter!(
        "worker_metrics_total",
        "Field values transformed into documents"
    );

    // =========================================================================
    // Store
    // =========================================================================

    describe_counter!("store_documents_written_total", "Documents accepted by the store");
    describe_counter!("store_write_errors_total", "Failed bulk writes");
    describe_histogram!(
        "store_bulk_write_duration_seconds",
        "Time spent in a single bulk write"
    );
}
