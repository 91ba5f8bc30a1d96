//! ClickHouse store.
//!
//! Each document becomes one row of a MergeTree table:
//!
//! ```text
//! measurement   LowCardinality(String)
//! timestamp_ns  Int64
//! fields        String                      -- JSON object
//! tags          Array(Tuple(String, String)) -- sorted by key
//! ```
//!
//! Every worker opens its own [`ClickHouseWriter`] with a private
//! current-thread runtime, so the synchronous worker loop can drive the async
//! client without sharing an executor.

use super::{BulkWriter, Store};
use crate::{Error, Result};
use clickhouse::{Client, Row};
use serde::Serialize;
use std::collections::BTreeMap;
use tokio::runtime::Runtime;
use tracing::{info, warn};
use tsload_core::Document;

/// Configuration for the ClickHouse store.
#[derive(Debug, Clone)]
pub struct ClickHouseConfig {
    /// ClickHouse server URL (e.g., "http://localhost:8123")
    pub url: String,

    /// Database name
    pub database: String,

    /// Table name for documents
    pub table: String,

    /// Create the database and table before loading.
    /// Disable on all but one client when several loaders share a database.
    pub create_database: bool,

    /// Fail instead of dropping an existing database when creating it.
    pub abort_on_exist: bool,
}

impl Default for ClickHouseConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8123".to_string(),
            database: "benchmark".to_string(),
            table: "point_data".to_string(),
            create_database: true,
            abort_on_exist: false,
        }
    }
}

impl ClickHouseConfig {
    /// Defaults overlaid with environment variables.
    ///
    /// Optional:
    /// - `CLICKHOUSE_URL`: server URL (default: "http://localhost:8123")
    /// - `CLICKHOUSE_DATABASE`: database name (default: "benchmark")
    /// - `CLICKHOUSE_TABLE`: table name (default: "point_data")
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            url: std::env::var("CLICKHOUSE_URL").unwrap_or(defaults.url),
            database: std::env::var("CLICKHOUSE_DATABASE").unwrap_or(defaults.database),
            table: std::env::var("CLICKHOUSE_TABLE").unwrap_or(defaults.table),
            ..defaults
        }
    }

    /// Check that database and table names are plain identifiers.
    ///
    /// They are spliced into DDL, so anything else is rejected.
    pub fn validate(&self) -> Result<()> {
        for (what, name) in [("database", &self.database), ("table", &self.table)] {
            if !is_identifier(name) {
                return Err(Error::Config(format!(
                    "{what} name {name:?} must match [A-Za-z_][A-Za-z0-9_]*"
                )));
            }
        }
        Ok(())
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Row structure matching the documents table.
#[derive(Debug, Clone, PartialEq, Row, Serialize)]
pub struct DocumentRow {
    pub measurement: String,
    pub timestamp_ns: i64,
    pub fields: String,
    pub tags: Vec<(String, String)>,
}

impl DocumentRow {
    /// Convert a document into a row. Field and tag order is made stable by
    /// sorting on key.
    pub fn from_document(doc: &Document) -> Result<Self> {
        let fields: BTreeMap<&str, _> = doc.fields.iter().map(|(k, v)| (k.as_str(), v)).collect();
        let fields = serde_json::to_string(&fields).map_err(tsload_core::Error::from)?;

        let mut tags: Vec<(String, String)> = doc
            .tags
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        tags.sort_unstable();

        Ok(Self {
            measurement: doc.measurement.clone(),
            timestamp_ns: doc.timestamp,
            fields,
            tags,
        })
    }
}

/// ClickHouse-backed [`Store`].
pub struct ClickHouseStore {
    client: Client,
    config: ClickHouseConfig,
}

impl ClickHouseStore {
    /// Create a store. No connection is made until first use.
    pub fn new(config: ClickHouseConfig) -> Self {
        let client = Client::default()
            .with_url(&config.url)
            .with_database(&config.database);

        info!(
            "ClickHouse store initialized: url={}, database={}, table={}",
            config.url, config.database, config.table
        );

        Self { client, config }
    }

    pub fn config(&self) -> &ClickHouseConfig {
        &self.config
    }

    /// Create the database and table.
    ///
    /// An existing database is dropped first, or reported as an error when
    /// `abort_on_exist` is set.
    pub async fn ensure_schema(&self) -> Result<()> {
        let admin = Client::default().with_url(&self.config.url);
        let database = &self.config.database;

        let exists: u64 = admin
            .query("SELECT count() FROM system.databases WHERE name = ?")
            .bind(database.as_str())
            .fetch_one()
            .await?;

        if exists > 0 {
            if self.config.abort_on_exist {
                return Err(Error::Config(format!(
                    "database {database} already exists"
                )));
            }
            warn!("Dropping existing database {}", database);
            admin
                .query(&format!("DROP DATABASE `{database}`"))
                .execute()
                .await?;
        }

        admin
            .query(&format!("CREATE DATABASE `{database}`"))
            .execute()
            .await?;
        admin.query(&create_table_sql(&self.config)).execute().await?;

        info!("Created table {}.{}", database, self.config.table);
        Ok(())
    }

    /// Check if ClickHouse is reachable.
    pub async fn health_check(&self) -> Result<bool> {
        let result: u8 = self.client.query("SELECT 1").fetch_one().await?;
        Ok(result == 1)
    }

    /// Get the count of rows in the documents table.
    pub async fn row_count(&self) -> Result<u64> {
        let query = format!("SELECT count() FROM `{}`", self.config.table);
        let count: u64 = self.client.query(&query).fetch_one().await?;
        Ok(count)
    }
}

fn create_table_sql(config: &ClickHouseConfig) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS `{}`.`{}` (\
            measurement LowCardinality(String), \
            timestamp_ns Int64, \
            fields String, \
            tags Array(Tuple(String, String))\
        ) ENGINE = MergeTree ORDER BY (measurement, timestamp_ns)",
        config.database, config.table
    )
}

impl Store for ClickHouseStore {
    type Writer = ClickHouseWriter;

    fn session(&self) -> Result<ClickHouseWriter> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;

        Ok(ClickHouseWriter {
            client: self.client.clone(),
            table: self.config.table.clone(),
            runtime,
        })
    }
}

/// One worker's ClickHouse session.
///
/// Must be dropped outside of any async context since it owns a runtime.
pub struct ClickHouseWriter {
    client: Client,
    table: String,
    runtime: Runtime,
}

impl BulkWriter for ClickHouseWriter {
    fn bulk_write(&mut self, documents: &[Document]) -> Result<u64> {
        if documents.is_empty() {
            return Ok(0);
        }

        let client = &self.client;
        let table = &self.table;
        self.runtime.block_on(async move {
            let mut inserter = client.insert(table)?;

            for doc in documents {
                let row = DocumentRow::from_document(doc)?;
                inserter.write(&row).await?;
            }

            inserter.end().await?;
            Ok::<u64, Error>(documents.len() as u64)
        })
    }
}
