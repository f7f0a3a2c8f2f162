//! Engine facade.
//!
//! Wires the event log, analytics, agents, fusion, catalog expansion and
//! interaction tracking together behind one type. Everything here is
//! re-derivable from the event log: dropping every other piece of state and
//! retraining reproduces the same recommendations.

use crate::agents::{
    CollaborativeAgent, ExternalModelAgent, ModelRuntime, ScoringAgent, StatisticalAgent,
};
use crate::analytics::{AnalyticsEngine, UserProfile};
use crate::cache::RecommendationCache;
use crate::catalog::CatalogClient;
use crate::config::EngineConfig;
use crate::events::{EventFilter, EventStore, ListeningEvent};
use crate::fusion::FusionAgent;
use crate::interactions::{CategoryStats, InteractionAction, InteractionStore, InteractionTracker};
use crate::model::{RecommendationBatch, RecommendationCandidate, RecommendationCategory};
use crate::recommender::CatalogRecommendationService;
use crate::training::{TrainingOrchestrator, TrainingReport};
use anyhow::Result;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info};

pub struct TuneFeedEngine {
    config: EngineConfig,
    events: Arc<dyn EventStore>,
    analytics: AnalyticsEngine,
    agents: Mutex<Vec<Box<dyn ScoringAgent>>>,
    fusion: FusionAgent,
    recommender: Option<CatalogRecommendationService>,
    tracker: InteractionTracker,
    orchestrator: TrainingOrchestrator,
    auto_trained: AtomicBool,
}

impl TuneFeedEngine {
    pub fn new(
        config: EngineConfig,
        events: Arc<dyn EventStore>,
        interactions: Arc<dyn InteractionStore>,
        catalog: Option<Arc<dyn CatalogClient>>,
        model_runtime: Arc<dyn ModelRuntime>,
    ) -> Self {
        let agents: Vec<Box<dyn ScoringAgent>> = vec![
            Box::new(StatisticalAgent::new(config.analytics.min_history_songs)),
            Box::new(CollaborativeAgent::new(
                config.analytics.min_history_songs,
                &config.training,
            )),
            Box::new(ExternalModelAgent::new(model_runtime)),
        ];

        let recommender = catalog.map(|client| {
            let cache = Arc::new(RecommendationCache::new(Duration::from_secs(
                config.cache.ttl_hours * 3600,
            )));
            CatalogRecommendationService::new(client, config.catalog.clone(), cache)
        });

        Self {
            analytics: AnalyticsEngine::new(config.analytics.clone()),
            fusion: FusionAgent::new(config.fusion.clone()),
            tracker: InteractionTracker::new(interactions),
            orchestrator: TrainingOrchestrator::new(),
            agents: Mutex::new(agents),
            auto_trained: AtomicBool::new(false),
            recommender,
            events,
            config,
        }
    }

    // =========================================================================
    // Event log
    // =========================================================================

    pub fn record_event(&self, event: &ListeningEvent) -> Result<i64> {
        self.events.append(event)
    }

    /// The event window every derivation in this engine works from.
    fn event_window(&self) -> Result<Vec<ListeningEvent>> {
        self.events.query(&EventFilter {
            limit: Some(self.config.analytics.window_events),
            ..Default::default()
        })
    }

    pub fn profile(&self) -> Result<UserProfile> {
        Ok(self.analytics.compute_profile(&self.event_window()?))
    }

    /// Whether the log holds at least `min_songs` distinct songs, the gate
    /// local agents need before their output means anything.
    pub fn has_enough_history(&self, min_songs: usize) -> Result<bool> {
        let distinct = self.events.distinct_song_count()?;
        Ok(distinct >= min_songs)
    }

    // =========================================================================
    // Training
    // =========================================================================

    pub async fn train_agents(&self) -> Result<TrainingReport> {
        let events = self.event_window()?;
        let profile = self.analytics.compute_profile(&events);
        let mut agents = self.agents.lock().await;
        let report = self.orchestrator.train_all(&mut agents, &profile, &events);
        // Only latch once something actually trained; a cycle run below the
        // history threshold must not stop later auto-training.
        if report.trained_count() > 0 {
            self.auto_trained.store(true, Ordering::SeqCst);
        }
        info!(
            trained = report.trained_count(),
            total = report.outcomes.len(),
            "Training cycle finished"
        );
        Ok(report)
    }

    /// Train lazily before a scoring request. Keeps retrying on later
    /// requests until some agent trains, so a log that crosses the history
    /// threshold after the first request still gets picked up.
    async fn ensure_trained(&self) -> Result<()> {
        if !self.auto_trained.load(Ordering::SeqCst) {
            debug!("No trained agents yet, running training cycle");
            self.train_agents().await?;
        }
        Ok(())
    }

    // =========================================================================
    // Recommendations
    // =========================================================================

    /// Local picks: the fused agent ranking over the user's own history.
    pub async fn get_local_picks(&self, count: usize) -> Result<Vec<RecommendationCandidate>> {
        self.ensure_trained().await?;
        let profile = self.profile()?;

        let mut candidates: Vec<String> = profile.songs.keys().cloned().collect();
        candidates.sort();

        let agents = self.agents.lock().await;
        let per_agent: BTreeMap<String, HashMap<String, f64>> = agents
            .iter()
            .filter(|agent| agent.is_trained())
            .map(|agent| (agent.name().to_string(), agent.score(&candidates, &profile)))
            .collect();
        drop(agents);

        Ok(self.fusion.fuse(&per_agent, &candidates, &profile, count))
    }

    /// Catalog-backed categories. Without a configured catalog this returns
    /// an empty batch rather than failing.
    pub async fn generate_recommendations(
        &self,
        force_refresh: bool,
    ) -> Result<RecommendationBatch> {
        let Some(recommender) = &self.recommender else {
            debug!("No catalog configured, returning empty batch");
            return Ok(RecommendationBatch::default());
        };
        let profile = self.profile()?;
        Ok(recommender.generate(&profile, force_refresh).await)
    }

    pub async fn category(
        &self,
        category: RecommendationCategory,
        force_refresh: bool,
    ) -> Result<Vec<RecommendationCandidate>> {
        if category == RecommendationCategory::LocalPicks {
            return self
                .get_local_picks(self.config.catalog.trending_total_cap)
                .await;
        }
        let Some(recommender) = &self.recommender else {
            return Ok(Vec::new());
        };
        let profile = self.profile()?;
        Ok(recommender.category(category, &profile, force_refresh).await)
    }

    // =========================================================================
    // Interactions
    // =========================================================================

    /// Fire and forget; a tracking failure never surfaces to the caller.
    pub fn track_interaction(
        &self,
        song_id: &str,
        action: InteractionAction,
        category: RecommendationCategory,
        timestamp_ms: i64,
    ) {
        self.tracker.record(song_id, action, category, timestamp_ms);
    }

    pub fn interaction_count(
        &self,
        category: RecommendationCategory,
        action: InteractionAction,
    ) -> Result<u64> {
        self.tracker.count_by_category(category, action)
    }

    pub fn interaction_stats(&self) -> Result<HashMap<RecommendationCategory, CategoryStats>> {
        self.tracker.stats_by_category()
    }
}
