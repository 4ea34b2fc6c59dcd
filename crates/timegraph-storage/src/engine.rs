//! StorageEngine owns the connections, runs migrations, exposes the
//! multi-table transaction primitive and the store clock.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, TransactionBehavior};

use timegraph_core::config::StorageConfig;
use timegraph_core::TgResult;

use crate::pool::{open_file, open_memory, ReadPool, WriteConnection};
use crate::{migrations, to_store_err};

pub struct StorageEngine {
    writer: Arc<WriteConnection>,
    readers: Arc<ReadPool>,
}

impl StorageEngine {
    /// Open the store described by `config` and bring the schema up to date.
    pub fn open(config: &StorageConfig) -> TgResult<Self> {
        let (writer, readers) = match &config.path {
            Some(path) => open_file(path, config.busy_timeout_ms)?,
            None => open_memory(config.busy_timeout_ms)?,
        };
        writer.with_conn_sync(|conn| migrations::run_migrations(conn).map(|_| ()))?;
        Ok(Self {
            writer: Arc::new(writer),
            readers: Arc::new(readers),
        })
    }

    /// In-memory store, mainly for tests.
    pub fn open_in_memory() -> TgResult<Self> {
        Self::open(&StorageConfig::default())
    }

    pub fn writer(&self) -> &Arc<WriteConnection> {
        &self.writer
    }

    pub fn readers(&self) -> &Arc<ReadPool> {
        &self.readers
    }

    /// Run `f` inside one ACID transaction on the write connection. Commits
    /// on `Ok`, rolls back on `Err`; partial writes are never observable.
    pub fn transaction<T>(&self, f: impl FnOnce(&Connection) -> TgResult<T>) -> TgResult<T> {
        self.writer.with_conn_sync(|conn| {
            let tx = conn
                .transaction_with_behavior(TransactionBehavior::Immediate)
                .map_err(|e| to_store_err(e.to_string()))?;
            match f(&tx) {
                Ok(out) => {
                    tx.commit().map_err(|e| to_store_err(e.to_string()))?;
                    Ok(out)
                }
                Err(e) => {
                    // Dropping the transaction rolls it back.
                    Err(e)
                }
            }
        })
    }

    /// The store's wall clock: SQLite's own `strftime`, millisecond
    /// precision, so every recorded ctime comes from a single source.
    pub fn now(&self) -> TgResult<DateTime<Utc>> {
        self.readers.with_conn(conn_now)
    }
}

/// The store clock read on an arbitrary connection, usable inside an open
/// transaction.
pub fn conn_now(conn: &Connection) -> TgResult<DateTime<Utc>> {
    let raw: String = conn
        .query_row("SELECT strftime('%Y-%m-%dT%H:%M:%fZ', 'now')", [], |row| {
            row.get(0)
        })
        .map_err(|e| to_store_err(e.to_string()))?;
    parse_store_time(&raw)
}

/// Parse an RFC3339 timestamp as written by the store clock.
pub fn parse_store_time(raw: &str) -> TgResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| to_store_err(format!("bad store timestamp '{raw}': {e}")))
}

/// Format a timestamp the way the store persists them.
pub fn format_store_time(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}
