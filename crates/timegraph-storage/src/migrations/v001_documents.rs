//! v001: live entity documents with optimistic revision tokens.

use rusqlite::Connection;

use timegraph_core::TgResult;

use crate::to_store_err;

pub fn migrate(conn: &Connection) -> TgResult<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS documents (
            collection TEXT NOT NULL,
            key        TEXT NOT NULL,
            rev        TEXT NOT NULL,
            body       TEXT NOT NULL,
            PRIMARY KEY (collection, key)
        );
        ",
    )
    .map_err(|e| to_store_err(e.to_string()))
}
