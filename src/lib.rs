//! TuneFeed Recommendation Engine Library
//!
//! This library exposes the internal modules for testing and potential reuse.

pub mod agents;
pub mod analytics;
pub mod cache;
pub mod catalog;
pub mod config;
pub mod engine;
pub mod events;
pub mod fusion;
pub mod interactions;
pub mod model;
pub mod recommender;
pub mod sqlite_persistence;
pub mod training;

// Re-export commonly used types for convenience
pub use agents::{ModelRuntime, NoOpModelRuntime, ScoringAgent};
pub use analytics::{AnalyticsEngine, UserProfile};
pub use catalog::{CatalogClient, HttpCatalogClient};
pub use config::EngineConfig;
pub use engine::TuneFeedEngine;
pub use events::{EventStore, InMemoryEventStore, ListeningEvent, SqliteEventStore};
pub use interactions::{
    InMemoryInteractionStore, InteractionAction, InteractionStore, SqliteInteractionStore,
};
pub use model::{RecommendationBatch, RecommendationCandidate, RecommendationCategory};
