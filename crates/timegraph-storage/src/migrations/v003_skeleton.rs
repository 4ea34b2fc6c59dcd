//! v003: the skeleton graph mirror and the sync job cursor.

use rusqlite::Connection;

use timegraph_core::TgResult;

use crate::to_store_err;

pub fn migrate(conn: &Connection) -> TgResult<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS skeleton_vertices (
            vertex_pk  INTEGER PRIMARY KEY AUTOINCREMENT,
            entity_id  TEXT NOT NULL UNIQUE,
            entity_key TEXT NOT NULL,
            collection TEXT NOT NULL,
            kind       TEXT NOT NULL CHECK (kind IN ('real', 'ghost'))
        );

        CREATE TABLE IF NOT EXISTS skeleton_hubs (
            hub_pk     INTEGER PRIMARY KEY AUTOINCREMENT,
            entity_id  TEXT NOT NULL UNIQUE,
            entity_key TEXT NOT NULL,
            collection TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS skeleton_spokes (
            spoke_pk    INTEGER PRIMARY KEY AUTOINCREMENT,
            hub_pk      INTEGER NOT NULL,
            logical_end TEXT NOT NULL CHECK (logical_end IN ('_from', '_to')),
            vertex_pk   INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_spokes_hub
            ON skeleton_spokes(hub_pk);
        CREATE INDEX IF NOT EXISTS idx_spokes_vertex
            ON skeleton_spokes(vertex_pk);

        CREATE TABLE IF NOT EXISTS skeleton_validity (
            interval_pk INTEGER PRIMARY KEY AUTOINCREMENT,
            owner_type  TEXT NOT NULL CHECK (owner_type IN ('vertex', 'hub', 'spoke')),
            owner_pk    INTEGER NOT NULL,
            valid_since TEXT NOT NULL,
            valid_until TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_validity_owner
            ON skeleton_validity(owner_type, owner_pk);

        CREATE TABLE IF NOT EXISTS sync_cursor (
            job           TEXT PRIMARY KEY,
            last_event_id INTEGER NOT NULL
        );
        ",
    )
    .map_err(|e| to_store_err(e.to_string()))
}
