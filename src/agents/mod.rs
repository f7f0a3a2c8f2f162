//! Scoring agents.
//!
//! Each agent scores candidate songs against the current [`UserProfile`]
//! from its own angle. Agents are deterministic: same profile, same training
//! data, same candidates, same scores. An untrained agent scores every
//! candidate at the neutral 0.5 so it neither promotes nor demotes anything.

mod collaborative;
mod external_model;
mod statistical;

pub use collaborative::CollaborativeAgent;
pub use external_model::{ExternalModelAgent, ModelRuntime, NoOpModelRuntime, ProfileSummary};
pub use statistical::StatisticalAgent;

use crate::analytics::UserProfile;
use crate::events::ListeningEvent;
use std::collections::HashMap;

pub const NEUTRAL_SCORE: f64 = 0.5;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AgentTrainingState {
    pub trained: bool,
    pub last_trained_at_ms: Option<i64>,
    /// Bumped on every successful training run
    pub version: u64,
}

#[derive(thiserror::Error, Debug)]
pub enum TrainError {
    #[error("Not enough listening history: needed {needed} distinct songs, got {got}")]
    InsufficientHistory { needed: usize, got: usize },
    #[error("Model runtime unavailable")]
    RuntimeUnavailable,
    #[error("Training failed: {0}")]
    Internal(String),
}

pub trait ScoringAgent: Send + Sync {
    fn name(&self) -> &'static str;

    /// Rebuild the agent's internal state from the profile and event log.
    /// Failure leaves the previous state untouched.
    fn train(
        &mut self,
        profile: &UserProfile,
        events: &[ListeningEvent],
    ) -> Result<AgentTrainingState, TrainError>;

    /// Score every candidate in [0, 1]. Total: every input id gets an entry.
    fn score(&self, song_ids: &[String], profile: &UserProfile) -> HashMap<String, f64>;

    fn training_state(&self) -> AgentTrainingState;

    fn is_trained(&self) -> bool {
        self.training_state().trained
    }
}

/// The neutral scoring every agent falls back to before training succeeds.
pub(crate) fn neutral_scores(song_ids: &[String]) -> HashMap<String, f64> {
    song_ids
        .iter()
        .map(|id| (id.clone(), NEUTRAL_SCORE))
        .collect()
}

pub(crate) fn distinct_song_count(events: &[ListeningEvent]) -> usize {
    events
        .iter()
        .map(|e| e.song_id.as_str())
        .collect::<std::collections::HashSet<_>>()
        .len()
}
