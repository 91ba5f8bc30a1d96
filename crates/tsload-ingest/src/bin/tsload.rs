//! Benchmark loader: JSON-lines time-series points into ClickHouse.
//!
//! Reads points from a file (gzip detected by extension) or stdin, writes
//! one row per point, and reports the mean load rate.
//!
//! # Pipeline
//!
//! ```text
//! [Input] → [Scanner] → [Worker × N] → [ClickHouse]
//! ```
//!
//! # Usage
//!
//! ```bash
//! # Load from stdin with 4 workers
//! zcat cpu-only.jsonl.gz | tsload --workers 4 --indexer round-robin
//!
//! # Decode/transform only, no writes
//! tsload -f cpu-only.jsonl.gz --do-load=false
//!
//! # With metrics
//! tsload -f data.jsonl --metrics-port 9091
//! ```

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use flate2::read::GzDecoder;
use metrics::gauge;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;
use tsload_core::JsonlDecoder;
use tsload_core::metrics::{init_metrics, start_metrics_server};
use tsload_ingest::{ClickHouseConfig, ClickHouseStore, IndexerKind, LoadConfig, LoadSummary, Loader};

/// Load time-series benchmark data into ClickHouse and measure throughput.
#[derive(Parser, Debug)]
#[command(name = "tsload")]
#[command(about = "Bulk-load JSON-lines time-series points into ClickHouse")]
struct Args {
    /// Input file (reads stdin when omitted; .gz is decompressed)
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Number of events per batch (and per bulk write)
    #[arg(long, default_value = "10000")]
    batch_size: usize,

    /// Number of parallel workers
    #[arg(long, default_value = "1")]
    workers: usize,

    /// Batches a worker may hold before the scanner waits for it
    #[arg(long, default_value = "1")]
    in_flight: usize,

    /// How batches are assigned to workers
    #[arg(long, value_enum, default_value_t = IndexerKind::Single)]
    indexer: IndexerKind,

    /// Stop after this many events
    #[arg(long)]
    limit: Option<u64>,

    /// Write to the database (false: decode and transform only)
    #[arg(long, action = ArgAction::Set, default_value_t = true)]
    do_load: bool,

    /// Create the database and table before loading
    #[arg(long, action = ArgAction::Set, default_value_t = true)]
    do_create_db: bool,

    /// Abort if the database already exists instead of dropping it
    #[arg(long, default_value_t = false)]
    do_abort_on_exist: bool,

    /// Seconds between progress reports (0 to disable)
    #[arg(long, default_value = "10")]
    reporting_period: u64,

    /// Metrics HTTP server port (0 to disable)
    #[arg(long, default_value = "0")]
    metrics_port: u16,

    /// ClickHouse URL (default: $CLICKHOUSE_URL or http://localhost:8123)
    #[arg(long)]
    clickhouse_url: Option<String>,

    /// Database name (default: $CLICKHOUSE_DATABASE or benchmark)
    #[arg(long)]
    db_name: Option<String>,

    /// Table name (default: $CLICKHOUSE_TABLE or point_data)
    #[arg(long)]
    table: Option<String>,
}

impl Args {
    fn load_config(&self) -> LoadConfig {
        LoadConfig {
            batch_size: self.batch_size,
            workers: self.workers,
            in_flight: self.in_flight,
            indexer: self.indexer,
            do_load: self.do_load,
            limit: self.limit,
            reporting_period: Duration::from_secs(self.reporting_period),
        }
    }

    fn clickhouse_config(&self) -> ClickHouseConfig {
        let mut config = ClickHouseConfig::from_env();
        if let Some(url) = &self.clickhouse_url {
            config.url = url.clone();
        }
        if let Some(db) = &self.db_name {
            config.database = db.clone();
        }
        if let Some(table) = &self.table {
            config.table = table.clone();
        }
        config.create_database = self.do_create_db;
        config.abort_on_exist = self.do_abort_on_exist;
        config
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let args = Args::parse();

    if args.metrics_port > 0 {
        let metrics_handle = init_metrics();
        start_metrics_server(args.metrics_port, metrics_handle).await?;
    }

    let load_config = args.load_config();
    load_config.validate()?;
    let ch_config = args.clickhouse_config();
    ch_config.validate()?;

    let store = Arc::new(ClickHouseStore::new(ch_config));
    if load_config.do_load {
        let url = &store.config().url;
        let healthy = store
            .health_check()
            .await
            .with_context(|| format!("ClickHouse unreachable at {url}"))?;
        anyhow::ensure!(healthy, "ClickHouse health check failed at {url}");
    }
    if load_config.do_load && store.config().create_database {
        store
            .ensure_schema()
            .await
            .context("failed to create ClickHouse schema")?;
    }

    let reader = open_input(args.file.as_deref())?;
    let mut decoder = JsonlDecoder::new(reader);

    gauge!("load_running").set(1.0);
    let loader = Loader::new(load_config, Arc::clone(&store));
    let result = tokio::task::block_in_place(|| loader.run(&mut decoder));
    gauge!("load_running").set(0.0);
    let summary = result.context("load failed")?;
    info!(
        lines = decoder.lines_read(),
        bytes = decoder.bytes_read(),
        "input consumed"
    );

    record_metrics(&summary);
    print_summary(&summary, args.workers);

    if args.do_load {
        let rows = store.row_count().await.context("failed to count rows")?;
        info!("{} rows in {}", rows, store.config().table);
    }

    Ok(())
}

/// Open the input file, or stdin when no path is given.
fn open_input(path: Option<&Path>) -> Result<Box<dyn BufRead>> {
    let Some(path) = path else {
        return Ok(Box::new(BufReader::new(io::stdin())));
    };

    let file =
        File::open(path).with_context(|| format!("failed to open {}", path.display()))?;

    let is_gzip = path.extension().is_some_and(|ext| ext == "gz");
    if is_gzip {
        Ok(Box::new(BufReader::new(GzDecoder::new(BufReader::new(file)))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

fn record_metrics(summary: &LoadSummary) {
    gauge!("load_events_per_second").set(summary.events_per_sec());
    gauge!("load_metrics_per_second").set(summary.metrics_per_sec());
}

fn print_summary(summary: &LoadSummary, workers: usize) {
    let secs = summary.elapsed.as_secs_f64();
    println!(
        "\nloaded {} metrics in {:.3}sec with {} workers (mean rate {:.2} metrics/sec)",
        summary.metrics,
        secs,
        workers,
        summary.metrics_per_sec()
    );
    println!(
        "loaded {} rows in {:.3}sec with {} workers (mean rate {:.2} rows/sec)",
        summary.events,
        secs,
        workers,
        summary.events_per_sec()
    );
    println!(
        "batches: {}  bulk writes: {}  documents written: {}  pool allocations: {} (reused {})",
        summary.batches,
        summary.bulk_writes(),
        summary.documents_written(),
        summary.pool.allocated,
        summary.pool.reused()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::io::{Read, Write};
    use tempfile::TempDir;
    use tsload_core::Decoder;

    #[test]
    fn test_args_defaults() {
        let args = Args::parse_from(["tsload"]);
        let config = args.load_config();
        assert_eq!(config.batch_size, 10_000);
        assert_eq!(config.workers, 1);
        assert_eq!(config.indexer, IndexerKind::Single);
        assert!(config.do_load);
        assert!(args.do_create_db);
        assert!(!args.do_abort_on_exist);
        assert_eq!(config.reporting_period, Duration::from_secs(10));
    }

    #[test]
    fn test_args_overrides() {
        let args = Args::parse_from([
            "tsload",
            "--batch-size",
            "500",
            "--workers",
            "8",
            "--indexer",
            "measurement-hash",
            "--do-load=false",
            "--limit",
            "1000",
            "--db-name",
            "tsbs",
            "--do-abort-on-exist",
        ]);
        let config = args.load_config();
        assert_eq!(config.batch_size, 500);
        assert_eq!(config.workers, 8);
        assert_eq!(config.indexer, IndexerKind::MeasurementHash);
        assert!(!config.do_load);
        assert_eq!(config.limit, Some(1000));

        let ch = args.clickhouse_config();
        assert_eq!(ch.database, "tsbs");
        assert!(ch.abort_on_exist);
    }

    #[test]
    fn test_open_plain_input() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("points.jsonl");
        std::fs::write(&path, "line one\n").unwrap();

        let mut content = String::new();
        open_input(Some(&path))
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();
        assert_eq!(content, "line one\n");
    }

    #[test]
    fn test_open_gzip_input() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("points.jsonl.gz");
        let mut encoder = GzEncoder::new(File::create(&path).unwrap(), Compression::default());
        encoder.write_all(b"{\"measurement\":\"cpu\",\"timestamp\":1}\n").unwrap();
        encoder.finish().unwrap();

        let mut content = String::new();
        open_input(Some(&path))
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();
        assert!(content.starts_with("{\"measurement\":\"cpu\""));
    }

    #[test]
    fn test_open_missing_input() {
        let Err(err) = open_input(Some(Path::new("/nonexistent/points.jsonl"))) else {
            panic!("expected missing input to fail");
        };
        assert!(err.to_string().contains("failed to open"));
    }

    #[test]
    fn test_gzip_input_counts_decompressed_bytes() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("points.jsonl.gz");
        let body = "{\"measurement\":\"cpu\",\"timestamp\":1}\n\n{\"measurement\":\"mem\",\"timestamp\":2}\n";
        let mut encoder = GzEncoder::new(File::create(&path).unwrap(), Compression::default());
        encoder.write_all(body.as_bytes()).unwrap();
        encoder.finish().unwrap();

        let mut decoder = JsonlDecoder::new(open_input(Some(&path)).unwrap());
        let mut events = 0;
        while decoder.next_event().unwrap().is_some() {
            events += 1;
        }
        assert_eq!(events, 2);
        assert_eq!(decoder.lines_read(), 3);
        assert_eq!(decoder.bytes_read(), body.len() as u64);
    }
}
