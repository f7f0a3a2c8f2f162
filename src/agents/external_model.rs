//! External model agent: delegates scoring to a pluggable model runtime.
//!
//! The engine never talks to a concrete model directly; it goes through the
//! [`ModelRuntime`] trait so deployments without a model fall back cleanly.
//! Runtime failures degrade to neutral scores instead of failing the cycle.

use super::{neutral_scores, AgentTrainingState, ScoringAgent, TrainError, NEUTRAL_SCORE};
use crate::analytics::UserProfile;
use crate::events::ListeningEvent;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

/// Compact, serializable profile view handed to model runtimes.
#[derive(serde::Serialize, Debug, Clone, Default, PartialEq)]
pub struct ProfileSummary {
    pub top_artists: Vec<String>,
    pub top_genres: Vec<String>,
    pub song_count: usize,
}

impl ProfileSummary {
    pub fn from_profile(profile: &UserProfile) -> Self {
        Self {
            top_artists: profile
                .top_artists
                .iter()
                .map(|(artist, _)| artist.clone())
                .collect(),
            top_genres: profile
                .top_genres
                .iter()
                .map(|(genre, _)| genre.clone())
                .collect(),
            song_count: profile.songs.len(),
        }
    }
}

pub trait ModelRuntime: Send + Sync {
    fn is_available(&self) -> bool;

    /// Predict per-song scores in [0, 1]. Missing ids are treated as neutral
    /// by the caller.
    fn predict(
        &self,
        summary: &ProfileSummary,
        song_ids: &[String],
    ) -> anyhow::Result<HashMap<String, f64>>;
}

/// Runtime used when no model is deployed. Never available, never trains.
#[derive(Default)]
pub struct NoOpModelRuntime;

impl ModelRuntime for NoOpModelRuntime {
    fn is_available(&self) -> bool {
        false
    }

    fn predict(
        &self,
        _summary: &ProfileSummary,
        _song_ids: &[String],
    ) -> anyhow::Result<HashMap<String, f64>> {
        anyhow::bail!("No model runtime deployed")
    }
}

pub struct ExternalModelAgent {
    runtime: Arc<dyn ModelRuntime>,
    summary: ProfileSummary,
    state: AgentTrainingState,
}

impl ExternalModelAgent {
    pub fn new(runtime: Arc<dyn ModelRuntime>) -> Self {
        Self {
            runtime,
            summary: ProfileSummary::default(),
            state: AgentTrainingState::default(),
        }
    }
}

impl ScoringAgent for ExternalModelAgent {
    fn name(&self) -> &'static str {
        "external_model"
    }

    fn train(
        &mut self,
        profile: &UserProfile,
        _events: &[ListeningEvent],
    ) -> Result<AgentTrainingState, TrainError> {
        if !self.runtime.is_available() {
            return Err(TrainError::RuntimeUnavailable);
        }
        self.summary = ProfileSummary::from_profile(profile);
        self.state = AgentTrainingState {
            trained: true,
            last_trained_at_ms: Some(profile.generated_at_ms),
            version: self.state.version + 1,
        };
        Ok(self.state.clone())
    }

    fn score(&self, song_ids: &[String], _profile: &UserProfile) -> HashMap<String, f64> {
        if !self.state.trained || !self.runtime.is_available() {
            return neutral_scores(song_ids);
        }
        match self.runtime.predict(&self.summary, song_ids) {
            Ok(predicted) => song_ids
                .iter()
                .map(|id| {
                    let score = predicted.get(id).copied().unwrap_or(NEUTRAL_SCORE);
                    (id.clone(), score.clamp(0.0, 1.0))
                })
                .collect(),
            Err(error) => {
                warn!(?error, "Model prediction failed, scoring neutral");
                neutral_scores(song_ids)
            }
        }
    }

    fn training_state(&self) -> AgentTrainingState {
        self.state.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedRuntime {
        available: bool,
        scores: HashMap<String, f64>,
        fail: bool,
    }

    impl ModelRuntime for FixedRuntime {
        fn is_available(&self) -> bool {
            self.available
        }

        fn predict(
            &self,
            _summary: &ProfileSummary,
            _song_ids: &[String],
        ) -> anyhow::Result<HashMap<String, f64>> {
            if self.fail {
                anyhow::bail!("runtime exploded");
            }
            Ok(self.scores.clone())
        }
    }

    #[test]
    fn test_noop_runtime_never_trains() {
        let mut agent = ExternalModelAgent::new(Arc::new(NoOpModelRuntime));
        let err = agent.train(&UserProfile::default(), &[]).unwrap_err();
        assert!(matches!(err, TrainError::RuntimeUnavailable));

        let scores = agent.score(&["x".to_string()], &UserProfile::default());
        assert_eq!(scores["x"], NEUTRAL_SCORE);
    }

    #[test]
    fn test_predictions_pass_through_clamped() {
        let runtime = FixedRuntime {
            available: true,
            scores: HashMap::from([("hot".to_string(), 1.7), ("cold".to_string(), 0.2)]),
            fail: false,
        };
        let mut agent = ExternalModelAgent::new(Arc::new(runtime));
        agent.train(&UserProfile::default(), &[]).unwrap();

        let ids = vec!["hot".to_string(), "cold".to_string(), "other".to_string()];
        let scores = agent.score(&ids, &UserProfile::default());
        assert_eq!(scores["hot"], 1.0);
        assert_eq!(scores["cold"], 0.2);
        assert_eq!(scores["other"], NEUTRAL_SCORE);
    }

    #[test]
    fn test_prediction_failure_degrades_to_neutral() {
        let runtime = FixedRuntime {
            available: true,
            scores: HashMap::new(),
            fail: true,
        };
        let mut agent = ExternalModelAgent::new(Arc::new(runtime));
        agent.train(&UserProfile::default(), &[]).unwrap();

        let scores = agent.score(&["x".to_string()], &UserProfile::default());
        assert_eq!(scores["x"], NEUTRAL_SCORE);
    }
}
