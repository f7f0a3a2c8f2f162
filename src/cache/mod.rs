//! Recommendation cache.
//!
//! Entries are keyed by category and profile epoch, so a changed profile
//! naturally misses even while older entries are still inside their TTL.
//! Purely in-memory; a restart starts cold, which is correct because the
//! cache is never a source of truth.

use crate::model::{RecommendationCandidate, RecommendationCategory};
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};
use tracing::debug;

struct CacheEntry {
    candidates: Vec<RecommendationCandidate>,
    inserted_at: Instant,
    ttl: Duration,
}

impl CacheEntry {
    fn is_fresh(&self, now: Instant) -> bool {
        now.duration_since(self.inserted_at) < self.ttl
    }
}

pub struct RecommendationCache {
    default_ttl: Duration,
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl RecommendationCache {
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            // Zero TTL would make every put invisible
            default_ttl: default_ttl.max(Duration::from_millis(1)),
            entries: RwLock::new(HashMap::new()),
        }
    }

    fn key(category: RecommendationCategory, epoch: &str) -> String {
        format!("{}:{}", category.as_str(), epoch)
    }

    pub fn get(
        &self,
        category: RecommendationCategory,
        epoch: &str,
    ) -> Option<Vec<RecommendationCandidate>> {
        let key = Self::key(category, epoch);
        let entries = self.entries.read().unwrap();
        match entries.get(&key) {
            Some(entry) if entry.is_fresh(Instant::now()) => Some(entry.candidates.clone()),
            _ => None,
        }
    }

    pub fn put(
        &self,
        category: RecommendationCategory,
        epoch: &str,
        candidates: Vec<RecommendationCandidate>,
    ) {
        self.put_with_ttl(category, epoch, candidates, self.default_ttl)
    }

    pub fn put_with_ttl(
        &self,
        category: RecommendationCategory,
        epoch: &str,
        candidates: Vec<RecommendationCandidate>,
        ttl: Duration,
    ) {
        let key = Self::key(category, epoch);
        debug!(%key, count = candidates.len(), "Caching recommendations");
        let mut entries = self.entries.write().unwrap();
        entries.insert(
            key,
            CacheEntry {
                candidates,
                inserted_at: Instant::now(),
                ttl: ttl.max(Duration::from_millis(1)),
            },
        );
    }

    pub fn invalidate(&self, category: RecommendationCategory, epoch: &str) {
        let key = Self::key(category, epoch);
        self.entries.write().unwrap().remove(&key);
    }

    pub fn clear(&self) {
        self.entries.write().unwrap().clear();
    }

    /// Drop expired entries. Bounds memory on long-running deployments.
    pub fn sweep_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write().unwrap();
        let before = entries.len();
        entries.retain(|_, entry| entry.is_fresh(now));
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
