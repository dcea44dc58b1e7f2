//! Event store migrations.
//!
//! Migrations run in order and are tracked in the `migrations` table.

use crate::StoreResult;
use rusqlite::Connection;
use tracing::{debug, info};

/// Current schema version.
pub const CURRENT_VERSION: i32 = 2;

/// Run all pending migrations.
pub fn run_migrations(conn: &Connection) -> StoreResult<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS migrations (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
        [],
    )?;

    let current_version: i32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM migrations",
        [],
        |row| row.get(0),
    )?;

    if current_version >= CURRENT_VERSION {
        return Ok(());
    }

    info!(current_version, target_version = CURRENT_VERSION, "Running migrations");

    if current_version < 1 {
        migrate_v1_events(conn)?;
    }
    if current_version < 2 {
        migrate_v2_pending_index(conn)?;
    }

    info!("Migrations complete");
    Ok(())
}

fn record_migration(conn: &Connection, version: i32, name: &str) -> StoreResult<()> {
    conn.execute(
        "INSERT INTO migrations (version, name) VALUES (?1, ?2)",
        rusqlite::params![version, name],
    )?;
    debug!(version, name, "Migration applied");
    Ok(())
}

/// V1: the events table. AUTOINCREMENT keeps ids strictly increasing even
/// after the newest rows are deleted.
fn migrate_v1_events(conn: &Connection) -> StoreResult<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            payload BLOB NOT NULL,
            enqueued_at TEXT NOT NULL,
            in_flight INTEGER NOT NULL DEFAULT 0
        );
        ",
    )?;
    record_migration(conn, 1, "events")
}

/// V2: covering index for "oldest N not in flight".
fn migrate_v2_pending_index(conn: &Connection) -> StoreResult<()> {
    conn.execute_batch(
        "
        CREATE INDEX IF NOT EXISTS idx_events_in_flight_id
            ON events(in_flight, id);
        ",
    )?;
    record_migration(conn, 2, "events_in_flight_index")
}
