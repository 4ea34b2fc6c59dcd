//! v002: the event/command/snapshot graph. All rows here are write-once;
//! only the purge sweep deletes them.

use rusqlite::Connection;

use timegraph_core::TgResult;

use crate::to_store_err;

pub fn migrate(conn: &Connection) -> TgResult<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS events (
            event_id           INTEGER PRIMARY KEY AUTOINCREMENT,
            collection         TEXT NOT NULL,
            entity_id          TEXT NOT NULL,
            entity_key         TEXT NOT NULL,
            entity_rev         TEXT NOT NULL,
            efrom              TEXT,
            eto                TEXT,
            ctime              TEXT NOT NULL,
            kind               TEXT NOT NULL,
            snapshot_id        INTEGER,
            hops_from_snapshot INTEGER NOT NULL DEFAULT 0,
            hops_from_origin   INTEGER NOT NULL DEFAULT 0
        );

        CREATE INDEX IF NOT EXISTS idx_events_entity_chain
            ON events(entity_id, hops_from_origin);
        CREATE INDEX IF NOT EXISTS idx_events_collection_time
            ON events(collection, ctime);
        CREATE INDEX IF NOT EXISTS idx_events_time
            ON events(ctime);
        CREATE UNIQUE INDEX IF NOT EXISTS idx_events_origin
            ON events(collection) WHERE kind = 'collection-init';

        CREATE TABLE IF NOT EXISTS commands (
            command_id INTEGER PRIMARY KEY AUTOINCREMENT,
            prev_event INTEGER NOT NULL,
            next_event INTEGER NOT NULL UNIQUE,
            entity_id  TEXT NOT NULL,
            forward    TEXT NOT NULL,
            reverse    TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_commands_entity
            ON commands(entity_id);
        CREATE INDEX IF NOT EXISTS idx_commands_prev
            ON commands(prev_event);

        CREATE TABLE IF NOT EXISTS snapshots (
            snapshot_id INTEGER PRIMARY KEY AUTOINCREMENT,
            entity_id   TEXT NOT NULL,
            ctime       TEXT NOT NULL,
            data        BLOB NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_snapshots_entity
            ON snapshots(entity_id);

        CREATE TABLE IF NOT EXISTS snapshot_links (
            prev_snapshot INTEGER NOT NULL,
            next_snapshot INTEGER NOT NULL,
            PRIMARY KEY (prev_snapshot, next_snapshot)
        );

        CREATE TABLE IF NOT EXISTS event_snapshot_links (
            event_id    INTEGER NOT NULL,
            snapshot_id INTEGER NOT NULL,
            PRIMARY KEY (event_id, snapshot_id)
        );
        ",
    )
    .map_err(|e| to_store_err(e.to_string()))
}
