//! SQLite schema for recommendation interactions.

use crate::sqlite_column;
use crate::sqlite_persistence::{Column, SqlType, Table, VersionedSchema};

const INTERACTION_TABLE: Table = Table {
    name: "recommendation_interaction",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("song_id", &SqlType::Text, non_null = true),
        sqlite_column!("category", &SqlType::Text, non_null = true),
        sqlite_column!("action", &SqlType::Text, non_null = true),
        sqlite_column!("timestamp_ms", &SqlType::Integer, non_null = true),
    ],
    indices: &[
        ("idx_interaction_category", "category"),
        ("idx_interaction_timestamp", "timestamp_ms"),
    ],
};

pub const INTERACTIONS_VERSIONED_SCHEMAS: &[VersionedSchema] = &[VersionedSchema {
    version: 0,
    tables: &[INTERACTION_TABLE],
    migration: None,
}];
