//! Interaction storage.

use super::models::{CategoryStats, InteractionAction, RecommendationInteraction};
use super::schema::INTERACTIONS_VERSIONED_SCHEMAS;
use crate::model::RecommendationCategory;
use crate::sqlite_persistence::migrate_if_needed;
use anyhow::{anyhow, Context, Result};
use rusqlite::{params, Connection};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, RwLock};

pub trait InteractionStore: Send + Sync {
    /// Records an interaction and returns its row id.
    fn record(&self, interaction: &RecommendationInteraction) -> Result<i64>;

    /// All interactions at or after `since_ms`, ascending by timestamp.
    fn query_since(&self, since_ms: i64) -> Result<Vec<RecommendationInteraction>>;

    /// How many times `action` was recorded against `category`.
    fn count_by_category(
        &self,
        category: RecommendationCategory,
        action: InteractionAction,
    ) -> Result<u64>;

    /// Action counters grouped by category.
    fn stats_by_category(&self) -> Result<HashMap<RecommendationCategory, CategoryStats>>;
}

fn accumulate(
    stats: &mut HashMap<RecommendationCategory, CategoryStats>,
    category: RecommendationCategory,
    action: InteractionAction,
    count: u64,
) {
    let entry = stats.entry(category).or_default();
    match action {
        InteractionAction::Played => entry.played += count,
        InteractionAction::Skipped => entry.skipped += count,
        InteractionAction::Liked => entry.liked += count,
        InteractionAction::Disliked => entry.disliked += count,
    }
}

// =============================================================================
// SQLite implementation
// =============================================================================

#[derive(Clone)]
pub struct SqliteInteractionStore {
    read_conn: Arc<Mutex<Connection>>,
    write_conn: Arc<Mutex<Connection>>,
}

impl SqliteInteractionStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let db_path_ref = db_path.as_ref();

        let mut write_conn = Connection::open_with_flags(
            db_path_ref,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI
                | rusqlite::OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .context("Failed to open interactions database")?;

        migrate_if_needed(&mut write_conn, INTERACTIONS_VERSIONED_SCHEMAS)?;

        write_conn
            .pragma_update(None, "journal_mode", "WAL")
            .context("Failed to set WAL mode on interactions write connection")?;

        let read_conn = Connection::open_with_flags(
            db_path_ref,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY
                | rusqlite::OpenFlags::SQLITE_OPEN_URI
                | rusqlite::OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .context("Failed to open interactions database for reading")?;

        read_conn
            .pragma_update(None, "journal_mode", "WAL")
            .context("Failed to set WAL mode on interactions read connection")?;

        Ok(Self {
            read_conn: Arc::new(Mutex::new(read_conn)),
            write_conn: Arc::new(Mutex::new(write_conn)),
        })
    }

    fn row_to_interaction(row: &rusqlite::Row<'_>) -> rusqlite::Result<RecommendationInteraction> {
        let category_raw: String = row.get(2)?;
        let action_raw: String = row.get(3)?;
        Ok(RecommendationInteraction {
            id: Some(row.get(0)?),
            song_id: row.get(1)?,
            category: RecommendationCategory::from_str_loose(&category_raw).ok_or_else(|| {
                rusqlite::Error::FromSqlConversionFailure(
                    2,
                    rusqlite::types::Type::Text,
                    format!("Unknown category: {category_raw}").into(),
                )
            })?,
            action: InteractionAction::from_str_loose(&action_raw).ok_or_else(|| {
                rusqlite::Error::FromSqlConversionFailure(
                    3,
                    rusqlite::types::Type::Text,
                    format!("Unknown action: {action_raw}").into(),
                )
            })?,
            timestamp_ms: row.get(4)?,
        })
    }
}

impl InteractionStore for SqliteInteractionStore {
    fn record(&self, interaction: &RecommendationInteraction) -> Result<i64> {
        let conn = self.write_conn.lock().unwrap();
        conn.execute(
            "INSERT INTO recommendation_interaction (song_id, category, action, timestamp_ms) \
             VALUES (?1, ?2, ?3, ?4)",
            params![
                interaction.song_id,
                interaction.category.as_str(),
                interaction.action.as_str(),
                interaction.timestamp_ms,
            ],
        )
        .context("Failed to record interaction")?;
        Ok(conn.last_insert_rowid())
    }

    fn query_since(&self, since_ms: i64) -> Result<Vec<RecommendationInteraction>> {
        let conn = self.read_conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, song_id, category, action, timestamp_ms \
             FROM recommendation_interaction WHERE timestamp_ms >= ?1 \
             ORDER BY timestamp_ms ASC, id ASC",
        )?;
        let interactions = stmt
            .query_map(params![since_ms], Self::row_to_interaction)?
            .collect::<rusqlite::Result<_>>()?;
        Ok(interactions)
    }

    fn count_by_category(
        &self,
        category: RecommendationCategory,
        action: InteractionAction,
    ) -> Result<u64> {
        let conn = self.read_conn.lock().unwrap();
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM recommendation_interaction \
                 WHERE category = ?1 AND action = ?2",
                params![category.as_str(), action.as_str()],
                |row| row.get(0),
            )
            .context("Failed to count interactions")?;
        Ok(count as u64)
    }

    fn stats_by_category(&self) -> Result<HashMap<RecommendationCategory, CategoryStats>> {
        let conn = self.read_conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT category, action, COUNT(*) FROM recommendation_interaction \
             GROUP BY category, action",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
            ))
        })?;

        let mut stats = HashMap::new();
        for row in rows {
            let (category_raw, action_raw, count) = row?;
            let category = RecommendationCategory::from_str_loose(&category_raw)
                .ok_or_else(|| anyhow!("Unknown category in store: {category_raw}"))?;
            let action = InteractionAction::from_str_loose(&action_raw)
                .ok_or_else(|| anyhow!("Unknown action in store: {action_raw}"))?;
            accumulate(&mut stats, category, action, count as u64);
        }
        Ok(stats)
    }
}

// =============================================================================
// In-memory implementation
// =============================================================================

#[derive(Default)]
pub struct InMemoryInteractionStore {
    interactions: RwLock<Vec<RecommendationInteraction>>,
}

impl InMemoryInteractionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl InteractionStore for InMemoryInteractionStore {
    fn record(&self, interaction: &RecommendationInteraction) -> Result<i64> {
        let mut interactions = self.interactions.write().unwrap();
        let id = interactions.len() as i64 + 1;
        let mut interaction = interaction.clone();
        interaction.id = Some(id);
        interactions.push(interaction);
        Ok(id)
    }

    fn query_since(&self, since_ms: i64) -> Result<Vec<RecommendationInteraction>> {
        let interactions = self.interactions.read().unwrap();
        let mut matching: Vec<RecommendationInteraction> = interactions
            .iter()
            .filter(|i| i.timestamp_ms >= since_ms)
            .cloned()
            .collect();
        matching.sort_by_key(|i| (i.timestamp_ms, i.id));
        Ok(matching)
    }

    fn count_by_category(
        &self,
        category: RecommendationCategory,
        action: InteractionAction,
    ) -> Result<u64> {
        let interactions = self.interactions.read().unwrap();
        Ok(interactions
            .iter()
            .filter(|i| i.category == category && i.action == action)
            .count() as u64)
    }

    fn stats_by_category(&self) -> Result<HashMap<RecommendationCategory, CategoryStats>> {
        let interactions = self.interactions.read().unwrap();
        let mut stats = HashMap::new();
        for interaction in interactions.iter() {
            accumulate(&mut stats, interaction.category, interaction.action, 1);
        }
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn interaction(
        song_id: &str,
        category: RecommendationCategory,
        action: InteractionAction,
        timestamp_ms: i64,
    ) -> RecommendationInteraction {
        RecommendationInteraction {
            id: None,
            song_id: song_id.to_string(),
            category,
            action,
            timestamp_ms,
        }
    }

    fn check_store(store: &dyn InteractionStore) {
        store
            .record(&interaction(
                "s1",
                RecommendationCategory::Trending,
                InteractionAction::Played,
                1_000,
            ))
            .unwrap();
        store
            .record(&interaction(
                "s1",
                RecommendationCategory::Trending,
                InteractionAction::Liked,
                2_000,
            ))
            .unwrap();
        store
            .record(&interaction(
                "s2",
                RecommendationCategory::Discovery,
                InteractionAction::Skipped,
                3_000,
            ))
            .unwrap();

        let all = store.query_since(0).unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].song_id, "s1");

        let recent = store.query_since(2_500).unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].category, RecommendationCategory::Discovery);

        assert_eq!(
            store
                .count_by_category(RecommendationCategory::Trending, InteractionAction::Played)
                .unwrap(),
            1
        );
        assert_eq!(
            store
                .count_by_category(
                    RecommendationCategory::Discovery,
                    InteractionAction::Disliked
                )
                .unwrap(),
            0
        );

        let stats = store.stats_by_category().unwrap();
        let trending = stats[&RecommendationCategory::Trending];
        assert_eq!(trending.played, 1);
        assert_eq!(trending.liked, 1);
        assert_eq!(stats[&RecommendationCategory::Discovery].skipped, 1);
    }

    #[test]
    fn test_in_memory_store() {
        let store = InMemoryInteractionStore::new();
        check_store(&store);
    }

    #[test]
    fn test_sqlite_store() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = SqliteInteractionStore::new(dir.path().join("interactions.db")).unwrap();
        check_store(&store);
    }
}
