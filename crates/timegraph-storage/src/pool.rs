//! Connection handling: one serialized write connection, a small round-robin
//! read pool. In-memory stores use SQLite shared-cache URIs so the readers
//! see the writer's database.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use rusqlite::{Connection, OpenFlags};

use timegraph_core::errors::StoreError;
use timegraph_core::{TgResult, TimegraphError};

use crate::to_store_err;

/// Number of read connections per pool.
const READ_POOL_SIZE: usize = 4;

pub mod pragmas {
    use rusqlite::Connection;
    use timegraph_core::TgResult;

    use crate::to_store_err;

    /// Session pragmas applied to every connection.
    pub fn apply_pragmas(conn: &Connection, busy_timeout_ms: u64) -> TgResult<()> {
        conn.execute_batch(&format!(
            "PRAGMA foreign_keys = ON;
             PRAGMA synchronous = NORMAL;
             PRAGMA busy_timeout = {busy_timeout_ms};"
        ))
        .map_err(|e| to_store_err(e.to_string()))
    }

    /// WAL is only meaningful for file-backed databases.
    pub fn enable_wal(conn: &Connection) -> TgResult<()> {
        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(|e| to_store_err(e.to_string()))
    }
}

/// The single write connection. All mutations are serialized through it;
/// concurrent writers queue on the mutex and SQLite's transaction lock.
pub struct WriteConnection {
    conn: Mutex<Connection>,
}

impl WriteConnection {
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    pub fn with_conn_sync<T>(
        &self,
        f: impl FnOnce(&mut Connection) -> TgResult<T>,
    ) -> TgResult<T> {
        let mut guard = self
            .conn
            .lock()
            .map_err(|e| TimegraphError::Store(StoreError::Poisoned(e.to_string())))?;
        f(&mut guard)
    }
}

/// Round-robin pool of read connections. Reads take no write locks and never
/// block the writer.
pub struct ReadPool {
    connections: Vec<Mutex<Connection>>,
    next: AtomicUsize,
}

impl ReadPool {
    pub fn new(connections: Vec<Connection>) -> Self {
        Self {
            connections: connections.into_iter().map(Mutex::new).collect(),
            next: AtomicUsize::new(0),
        }
    }

    pub fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> TgResult<T>) -> TgResult<T> {
        let idx = self.next.fetch_add(1, Ordering::Relaxed) % self.connections.len();
        let guard = self.connections[idx]
            .lock()
            .map_err(|e| TimegraphError::Store(StoreError::Poisoned(e.to_string())))?;
        f(&guard)
    }
}

/// Open writer + readers against a database file.
pub fn open_file(path: &Path, busy_timeout_ms: u64) -> TgResult<(WriteConnection, ReadPool)> {
    let writer = Connection::open(path).map_err(|e| to_store_err(e.to_string()))?;
    pragmas::apply_pragmas(&writer, busy_timeout_ms)?;
    pragmas::enable_wal(&writer)?;

    let mut readers = Vec::with_capacity(READ_POOL_SIZE);
    for _ in 0..READ_POOL_SIZE {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| to_store_err(e.to_string()))?;
        pragmas::apply_pragmas(&conn, busy_timeout_ms)?;
        readers.push(conn);
    }

    Ok((WriteConnection::new(writer), ReadPool::new(readers)))
}

/// Open writer + readers against a private shared-cache in-memory database.
/// The writer keeps the database alive for the readers' lifetime.
pub fn open_memory(busy_timeout_ms: u64) -> TgResult<(WriteConnection, ReadPool)> {
    let uri = format!(
        "file:timegraph-{}?mode=memory&cache=shared",
        uuid::Uuid::new_v4().simple()
    );
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_URI
        | OpenFlags::SQLITE_OPEN_NO_MUTEX;

    let writer = Connection::open_with_flags(&uri, flags)
        .map_err(|e| to_store_err(e.to_string()))?;
    pragmas::apply_pragmas(&writer, busy_timeout_ms)?;

    let mut readers = Vec::with_capacity(READ_POOL_SIZE);
    for _ in 0..READ_POOL_SIZE {
        let conn = Connection::open_with_flags(&uri, flags)
            .map_err(|e| to_store_err(e.to_string()))?;
        pragmas::apply_pragmas(&conn, busy_timeout_ms)?;
        readers.push(conn);
    }

    Ok((WriteConnection::new(writer), ReadPool::new(readers)))
}
