//! Recommendation interaction tracking.
//!
//! Records what the user did with recommended songs, so category performance
//! can be inspected over time. Interactions are an auxiliary signal; the
//! listening event log stays the single source of truth for taste.

mod models;
mod schema;
mod store;

pub use models::{CategoryStats, InteractionAction, RecommendationInteraction};
pub use store::{InMemoryInteractionStore, InteractionStore, SqliteInteractionStore};

use crate::model::RecommendationCategory;
use anyhow::Result;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

pub struct InteractionTracker {
    store: Arc<dyn InteractionStore>,
}

impl InteractionTracker {
    pub fn new(store: Arc<dyn InteractionStore>) -> Self {
        Self { store }
    }

    /// Record an interaction. Fire and forget: a storage failure is logged
    /// and never surfaces, tracking must not break playback flows.
    pub fn record(
        &self,
        song_id: &str,
        action: InteractionAction,
        category: RecommendationCategory,
        timestamp_ms: i64,
    ) {
        let result = self.store.record(&RecommendationInteraction {
            id: None,
            song_id: song_id.to_string(),
            category,
            action,
            timestamp_ms,
        });
        match result {
            Ok(id) => debug!(song_id, action = action.as_str(), id, "Recorded interaction"),
            Err(error) => warn!(song_id, ?error, "Failed to record interaction"),
        }
    }

    pub fn count_by_category(
        &self,
        category: RecommendationCategory,
        action: InteractionAction,
    ) -> Result<u64> {
        self.store.count_by_category(category, action)
    }

    pub fn stats_by_category(&self) -> Result<HashMap<RecommendationCategory, CategoryStats>> {
        self.store.stats_by_category()
    }
}
