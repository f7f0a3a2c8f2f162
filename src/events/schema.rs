//! SQLite schema for the listening event log.

use crate::sqlite_column;
use crate::sqlite_persistence::{Column, SqlType, Table, VersionedSchema};

const LISTENING_EVENT_TABLE: Table = Table {
    name: "listening_event",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("song_id", &SqlType::Text, non_null = true),
        sqlite_column!("artist", &SqlType::Text, non_null = true),
        sqlite_column!("genre", &SqlType::Text),
        sqlite_column!("timestamp_ms", &SqlType::Integer, non_null = true),
        sqlite_column!("play_duration_sec", &SqlType::Integer, non_null = true),
        sqlite_column!("total_duration_sec", &SqlType::Integer, non_null = true),
        sqlite_column!("play_count", &SqlType::Integer, non_null = true),
        sqlite_column!("skipped", &SqlType::Integer, non_null = true),
    ],
    indices: &[
        ("idx_listening_event_song_id", "song_id"),
        ("idx_listening_event_timestamp", "timestamp_ms"),
    ],
};

pub const EVENTS_VERSIONED_SCHEMAS: &[VersionedSchema] = &[VersionedSchema {
    version: 0,
    tables: &[LISTENING_EVENT_TABLE],
    migration: None,
}];
