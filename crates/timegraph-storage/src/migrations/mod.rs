//! Migration runner: version tracking, forward-only, transactional per
//! migration.

mod v001_documents;
mod v002_event_graph;
mod v003_skeleton;

use rusqlite::Connection;
use tracing::{debug, info, warn};

use timegraph_core::errors::StoreError;
use timegraph_core::{TgResult, TimegraphError};

use crate::to_store_err;

/// Total number of migrations.
pub const LATEST_VERSION: u32 = 3;

type MigrationFn = fn(&Connection) -> TgResult<()>;

const MIGRATIONS: [(u32, &str, MigrationFn); 3] = [
    (1, "documents", v001_documents::migrate),
    (2, "event_graph", v002_event_graph::migrate),
    (3, "skeleton", v003_skeleton::migrate),
];

/// Get the current schema version. Returns 0 before the first migration.
pub fn current_version(conn: &Connection) -> TgResult<u32> {
    let exists: bool = conn
        .prepare("SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version'")
        .and_then(|mut stmt| stmt.exists([]))
        .map_err(|e| to_store_err(e.to_string()))?;

    if !exists {
        return Ok(0);
    }

    conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )
    .map_err(|e| to_store_err(e.to_string()))
}

/// Run all pending migrations. Forward-only, each in its own transaction.
pub fn run_migrations(conn: &Connection) -> TgResult<u32> {
    ensure_version_table(conn)?;
    let current = current_version(conn)?;

    if current >= LATEST_VERSION {
        debug!("schema is up to date (v{current})");
        return Ok(0);
    }

    info!("running migrations: v{current} -> v{LATEST_VERSION}");
    let mut applied = 0;

    for &(version, name, migrate_fn) in &MIGRATIONS {
        if version <= current {
            continue;
        }

        debug!("applying migration v{version:03}: {name}");
        conn.execute_batch("BEGIN IMMEDIATE")
            .map_err(|e| to_store_err(format!("begin transaction for v{version:03}: {e}")))?;

        match migrate_fn(conn) {
            Ok(()) => {
                conn.execute("INSERT INTO schema_version (version) VALUES (?1)", [version])
                    .map_err(|e| to_store_err(format!("record version v{version:03}: {e}")))?;
                conn.execute_batch("COMMIT")
                    .map_err(|e| to_store_err(format!("commit v{version:03}: {e}")))?;
                applied += 1;
            }
            Err(e) => {
                warn!("migration v{version:03} failed: {e}, rolling back");
                let _ = conn.execute_batch("ROLLBACK");
                return Err(TimegraphError::Store(StoreError::MigrationFailed {
                    version,
                    reason: e.to_string(),
                }));
            }
        }
    }

    info!("applied {applied} migration(s), now at v{LATEST_VERSION}");
    Ok(applied)
}

fn ensure_version_table(conn: &Connection) -> TgResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version    INTEGER NOT NULL,
            applied_at TEXT DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
        )",
    )
    .map_err(|e| to_store_err(e.to_string()))
}
