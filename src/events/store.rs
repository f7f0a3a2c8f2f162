//! Listening event storage.
//!
//! The event log is append-only: the engine only ever reads it, the playback
//! layer only ever appends to it. Readers always see a consistent prefix of
//! the log (WAL mode, separate read connection).

use super::models::{EventFilter, ListeningEvent};
use super::schema::EVENTS_VERSIONED_SCHEMAS;
use crate::sqlite_persistence::migrate_if_needed;
use anyhow::{Context, Result};
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::{Arc, Mutex, RwLock};
use tracing::info;

pub trait EventStore: Send + Sync {
    /// Appends an event to the log and returns its row id.
    fn append(&self, event: &ListeningEvent) -> Result<i64>;

    /// Returns events matching the filter, ordered by ascending timestamp.
    /// With a `limit`, the most recent N events are returned (still ascending).
    fn query(&self, filter: &EventFilter) -> Result<Vec<ListeningEvent>>;

    /// Number of distinct songs in the whole log. This is the cold-start gate.
    fn distinct_song_count(&self) -> Result<usize>;
}

// =============================================================================
// SQLite implementation
// =============================================================================

/// SQLite-backed event log.
#[derive(Clone)]
pub struct SqliteEventStore {
    read_conn: Arc<Mutex<Connection>>,
    write_conn: Arc<Mutex<Connection>>,
}

impl SqliteEventStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let db_path_ref = db_path.as_ref();

        let mut write_conn = Connection::open_with_flags(
            db_path_ref,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI
                | rusqlite::OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .context("Failed to open events database")?;

        migrate_if_needed(&mut write_conn, EVENTS_VERSIONED_SCHEMAS)?;

        write_conn
            .pragma_update(None, "journal_mode", "WAL")
            .context("Failed to set WAL mode on events write connection")?;

        let read_conn = Connection::open_with_flags(
            db_path_ref,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY
                | rusqlite::OpenFlags::SQLITE_OPEN_URI
                | rusqlite::OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .context("Failed to open events database for reading")?;

        read_conn
            .pragma_update(None, "journal_mode", "WAL")
            .context("Failed to set WAL mode on events read connection")?;

        let event_count: usize =
            read_conn.query_row("SELECT COUNT(*) FROM listening_event", [], |r| r.get(0))?;
        info!("Event store ready: {} listening events", event_count);

        Ok(Self {
            read_conn: Arc::new(Mutex::new(read_conn)),
            write_conn: Arc::new(Mutex::new(write_conn)),
        })
    }

    fn row_to_event(row: &rusqlite::Row<'_>) -> rusqlite::Result<ListeningEvent> {
        Ok(ListeningEvent {
            id: Some(row.get(0)?),
            song_id: row.get(1)?,
            artist: row.get(2)?,
            genre: row.get(3)?,
            timestamp_ms: row.get(4)?,
            play_duration_sec: row.get(5)?,
            total_duration_sec: row.get(6)?,
            play_count: row.get(7)?,
            skipped: row.get::<_, i64>(8)? != 0,
        })
    }
}

impl EventStore for SqliteEventStore {
    fn append(&self, event: &ListeningEvent) -> Result<i64> {
        let conn = self.write_conn.lock().unwrap();
        conn.execute(
            "INSERT INTO listening_event \
             (song_id, artist, genre, timestamp_ms, play_duration_sec, total_duration_sec, play_count, skipped) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                event.song_id,
                event.artist,
                event.genre,
                event.timestamp_ms,
                event.play_duration_sec,
                event.total_duration_sec,
                event.play_count,
                event.skipped as i64,
            ],
        )
        .context("Failed to append listening event")?;
        Ok(conn.last_insert_rowid())
    }

    fn query(&self, filter: &EventFilter) -> Result<Vec<ListeningEvent>> {
        let conn = self.read_conn.lock().unwrap();

        let mut sql = String::from(
            "SELECT id, song_id, artist, genre, timestamp_ms, play_duration_sec, \
             total_duration_sec, play_count, skipped FROM listening_event",
        );
        let mut clauses: Vec<String> = Vec::new();
        let mut args: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

        if let Some(since) = filter.since_ms {
            clauses.push(format!("timestamp_ms >= ?{}", args.len() + 1));
            args.push(Box::new(since));
        }
        if let Some(song_id) = &filter.song_id {
            clauses.push(format!("song_id = ?{}", args.len() + 1));
            args.push(Box::new(song_id.clone()));
        }
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }

        // Take the most recent N, then flip back to ascending order
        let events = if let Some(limit) = filter.limit {
            sql.push_str(&format!(
                " ORDER BY timestamp_ms DESC, id DESC LIMIT ?{}",
                args.len() + 1
            ));
            args.push(Box::new(limit as i64));
            let mut stmt = conn.prepare(&sql)?;
            let mut events: Vec<ListeningEvent> = stmt
                .query_map(rusqlite::params_from_iter(args.iter()), Self::row_to_event)?
                .collect::<rusqlite::Result<_>>()?;
            events.reverse();
            events
        } else {
            sql.push_str(" ORDER BY timestamp_ms ASC, id ASC");
            let mut stmt = conn.prepare(&sql)?;
            let events: Vec<ListeningEvent> = stmt
                .query_map(rusqlite::params_from_iter(args.iter()), Self::row_to_event)?
                .collect::<rusqlite::Result<_>>()?;
            events
        };

        Ok(events)
    }

    fn distinct_song_count(&self) -> Result<usize> {
        let conn = self.read_conn.lock().unwrap();
        let count: usize = conn.query_row(
            "SELECT COUNT(DISTINCT song_id) FROM listening_event",
            [],
            |r| r.get(0),
        )?;
        Ok(count)
    }
}

// =============================================================================
// In-memory implementation
// =============================================================================

/// In-memory event log for tests and embedded use.
#[derive(Default)]
pub struct InMemoryEventStore {
    events: RwLock<Vec<ListeningEvent>>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EventStore for InMemoryEventStore {
    fn append(&self, event: &ListeningEvent) -> Result<i64> {
        let mut events = self.events.write().unwrap();
        let id = events.len() as i64 + 1;
        let mut event = event.clone();
        event.id = Some(id);
        events.push(event);
        Ok(id)
    }

    fn query(&self, filter: &EventFilter) -> Result<Vec<ListeningEvent>> {
        let events = self.events.read().unwrap();
        let mut matching: Vec<ListeningEvent> = events
            .iter()
            .filter(|e| filter.since_ms.map_or(true, |since| e.timestamp_ms >= since))
            .filter(|e| {
                filter
                    .song_id
                    .as_ref()
                    .map_or(true, |song_id| &e.song_id == song_id)
            })
            .cloned()
            .collect();
        matching.sort_by_key(|e| (e.timestamp_ms, e.id));
        if let Some(limit) = filter.limit {
            if matching.len() > limit {
                matching.drain(..matching.len() - limit);
            }
        }
        Ok(matching)
    }

    fn distinct_song_count(&self) -> Result<usize> {
        let events = self.events.read().unwrap();
        let distinct: std::collections::HashSet<&str> =
            events.iter().map(|e| e.song_id.as_str()).collect();
        Ok(distinct.len())
    }
}
