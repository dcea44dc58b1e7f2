//! SQLite-backed event store on a dedicated executor thread.
//!
//! All statements run on the tokio-rusqlite connection thread; payload
//! decoding happens back on the caller's task. Every mutation is a single
//! transaction, so the capacity check, in-flight marking and deletes are
//! atomic with respect to other callers.

use crate::{migrations, EventId, EventStore, Payload, QueuedEvent, StoreError, StoreResult};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::OpenFlags;
use serde::Serialize;
use std::path::Path;
use tokio_rusqlite::Connection;
use tracing::{debug, error, info, warn};

/// Convert a tokio_rusqlite::Error to StoreError.
fn from_tokio_rusqlite(e: tokio_rusqlite::Error) -> StoreError {
    match e {
        tokio_rusqlite::Error::Rusqlite(e) => StoreError::Sqlite(e),
        tokio_rusqlite::Error::ConnectionClosed => {
            StoreError::Connection("Connection closed".to_string())
        }
        other => StoreError::Connection(other.to_string()),
    }
}

type RawRow = (EventId, Vec<u8>, String);

/// Queue depth as read from disk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub queued: usize,
    pub in_flight: usize,
}

/// Durable [`EventStore`] backed by a single SQLite table.
#[derive(Clone)]
pub struct SqliteEventStore {
    conn: Connection,
    path: String,
    capacity: usize,
}

impl SqliteEventStore {
    /// Open (or create) the store at `path`.
    ///
    /// Runs pending migrations and clears in-flight marks left by a process
    /// that died mid-send, so those events are retried.
    pub async fn open(path: &Path, capacity: usize) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let path_str = path.to_string_lossy().to_string();
        info!(path = %path_str, capacity, "Opening event store");

        let conn = Connection::open(path).await.map_err(from_tokio_rusqlite)?;
        Self::init(conn, path_str, capacity).await
    }

    /// Read the queue depth of the store at `path` over a read-only
    /// connection.
    ///
    /// Runs no migrations and leaves in-flight marks alone, so another
    /// process can keep ticking on the same file. `None` when no store has
    /// been created there yet.
    pub async fn inspect(path: &Path) -> StoreResult<Option<StoreStats>> {
        if !path.exists() {
            return Ok(None);
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .await
        .map_err(from_tokio_rusqlite)?;

        let stats = conn
            .call(|conn| {
                let has_events: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'events'",
                    [],
                    |row| row.get(0),
                )?;
                if has_events == 0 {
                    return Ok(None);
                }
                let (queued, in_flight): (i64, i64) = conn.query_row(
                    "SELECT COUNT(*), COALESCE(SUM(in_flight != 0), 0) FROM events",
                    [],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )?;
                Ok(Some(StoreStats {
                    queued: queued as usize,
                    in_flight: in_flight as usize,
                }))
            })
            .await
            .map_err(from_tokio_rusqlite)?;

        conn.close().await.map_err(from_tokio_rusqlite)?;
        Ok(stats)
    }

    /// Open a private in-memory SQLite store (tests and ephemeral hosts).
    pub async fn open_in_memory(capacity: usize) -> StoreResult<Self> {
        let conn = Connection::open_in_memory()
            .await
            .map_err(from_tokio_rusqlite)?;
        Self::init(conn, ":memory:".to_string(), capacity).await
    }

    async fn init(conn: Connection, path: String, capacity: usize) -> StoreResult<Self> {
        let store = Self {
            conn,
            path,
            capacity,
        };

        let recovered = store
            .call(|conn| {
                conn.execute_batch(
                    "
                    PRAGMA journal_mode = WAL;
                    PRAGMA synchronous = FULL;
                    PRAGMA busy_timeout = 5000;
                    ",
                )?;
                migrations::run_migrations(conn)?;
                let reset = conn.execute(
                    "UPDATE events SET in_flight = 0 WHERE in_flight != 0",
                    [],
                )?;
                Ok(reset)
            })
            .await?;

        if recovered > 0 {
            warn!(count = recovered, "Reset in-flight events left by previous run");
        }
        info!(path = %store.path, "Event store ready");
        Ok(store)
    }

    /// Run a closure on the SQLite thread. SQL only: no decoding, locking or
    /// network calls inside.
    async fn call<F, T>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&mut rusqlite::Connection) -> StoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        match self.conn.call(move |conn| Ok(f(conn))).await {
            Ok(inner) => inner,
            Err(e) => Err(from_tokio_rusqlite(e)),
        }
    }

    /// Database file path (`:memory:` for in-memory stores).
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Close the connection and stop the executor thread.
    pub async fn close(self) -> StoreResult<()> {
        self.conn.close().await.map_err(from_tokio_rusqlite)
    }

    fn decode((id, bytes, enqueued_at): RawRow) -> StoreResult<QueuedEvent> {
        let payload = Payload::from_bytes(&bytes)?;
        let enqueued_at = DateTime::parse_from_rfc3339(&enqueued_at)
            .map_err(|e| StoreError::InvalidData(format!("event {id} enqueued_at: {e}")))?
            .with_timezone(&Utc);
        Ok(QueuedEvent {
            id,
            payload,
            enqueued_at,
        })
    }
}

#[async_trait]
impl EventStore for SqliteEventStore {
    async fn enqueue(&self, payload: Payload) -> StoreResult<EventId> {
        let bytes = payload.to_bytes()?;
        let enqueued_at = Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true);
        let capacity = self.capacity;

        let id = self
            .call(move |conn| {
                let tx = conn.transaction()?;
                let count: i64 =
                    tx.query_row("SELECT COUNT(*) FROM events", [], |row| row.get(0))?;
                if count as usize >= capacity {
                    return Err(StoreError::Full { capacity });
                }
                tx.execute(
                    "INSERT INTO events (payload, enqueued_at) VALUES (?1, ?2)",
                    rusqlite::params![bytes, enqueued_at],
                )?;
                let id = tx.last_insert_rowid();
                tx.commit()?;
                Ok(id)
            })
            .await?;

        debug!(id, "Enqueued event");
        Ok(id)
    }

    async fn peek_oldest(&self, limit: usize) -> StoreResult<Vec<QueuedEvent>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let rows = self
            .call(move |conn| {
                let tx = conn.transaction()?;
                let rows = {
                    let mut select = tx.prepare(
                        "SELECT id, payload, enqueued_at FROM events
                         WHERE in_flight = 0 ORDER BY id LIMIT ?1",
                    )?;
                    let mapped =
                        select.query_map([limit as i64], |row| -> rusqlite::Result<RawRow> {
                            Ok((row.get(0)?, row.get(1)?, row.get(2)?))
                        })?;
                    mapped.collect::<Result<Vec<_>, _>>()?
                };
                {
                    let mut mark = tx.prepare("UPDATE events SET in_flight = 1 WHERE id = ?1")?;
                    for (id, _, _) in &rows {
                        mark.execute([id])?;
                    }
                }
                tx.commit()?;
                Ok(rows)
            })
            .await?;

        let mut events = Vec::with_capacity(rows.len());
        let mut corrupt = Vec::new();
        for row in rows {
            let id = row.0;
            match Self::decode(row) {
                Ok(event) => events.push(event),
                Err(e) => {
                    error!(id, error = %e, "Discarding undecodable event");
                    corrupt.push(id);
                }
            }
        }
        if !corrupt.is_empty() {
            self.remove(&corrupt).await?;
        }

        debug!(count = events.len(), "Marked events in flight");
        Ok(events)
    }

    async fn remove(&self, ids: &[EventId]) -> StoreResult<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        let ids = ids.to_vec();

        let removed = self
            .call(move |conn| {
                let tx = conn.transaction()?;
                let mut removed = 0;
                {
                    let mut delete = tx.prepare("DELETE FROM events WHERE id = ?1")?;
                    for id in &ids {
                        removed += delete.execute([id])?;
                    }
                }
                tx.commit()?;
                Ok(removed)
            })
            .await?;

        debug!(count = removed, "Removed events");
        Ok(removed)
    }

    async fn release(&self, ids: &[EventId]) -> StoreResult<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let ids = ids.to_vec();

        self.call(move |conn| {
            let tx = conn.transaction()?;
            {
                let mut update = tx.prepare("UPDATE events SET in_flight = 0 WHERE id = ?1")?;
                for id in &ids {
                    update.execute([id])?;
                }
            }
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn count(&self) -> StoreResult<usize> {
        let count: i64 = self
            .call(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM events", [], |row| row.get(0))?))
            .await?;
        Ok(count as usize)
    }

    async fn in_flight_count(&self) -> StoreResult<usize> {
        let count: i64 = self
            .call(|conn| {
                Ok(conn.query_row(
                    "SELECT COUNT(*) FROM events WHERE in_flight != 0",
                    [],
                    |row| row.get(0),
                )?)
            })
            .await?;
        Ok(count as usize)
    }

    async fn remove_all(&self) -> StoreResult<usize> {
        let removed = self
            .call(|conn| Ok(conn.execute("DELETE FROM events", [])?))
            .await?;
        info!(count = removed, "Removed all events");
        Ok(removed)
    }
}
