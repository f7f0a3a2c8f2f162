//! Collaborative agent: session co-occurrence scoring.
//!
//! Training pairs events that fall within a proximity window of each other,
//! treating them as part of one listening session. Candidates are then scored
//! by how strongly they co-occur with anchor songs, the songs the user
//! reliably finishes.

use super::{
    distinct_song_count, neutral_scores, AgentTrainingState, ScoringAgent, TrainError,
    NEUTRAL_SCORE,
};
use crate::analytics::UserProfile;
use crate::config::TrainingSettings;
use crate::events::ListeningEvent;
use std::collections::{HashMap, HashSet};
use tracing::debug;

pub struct CollaborativeAgent {
    min_history_songs: usize,
    window_ms: i64,
    anchor_min_completion: f64,
    /// song id -> co-occurrence count with anchor songs
    anchor_affinity: HashMap<String, u64>,
    max_affinity: u64,
    state: AgentTrainingState,
}

impl CollaborativeAgent {
    pub fn new(min_history_songs: usize, training: &TrainingSettings) -> Self {
        Self {
            min_history_songs,
            window_ms: training.cooccurrence_window_ms,
            anchor_min_completion: training.anchor_min_completion,
            anchor_affinity: HashMap::new(),
            max_affinity: 0,
            state: AgentTrainingState::default(),
        }
    }

    fn build_affinity(&self, events: &[ListeningEvent], profile: &UserProfile) -> HashMap<String, u64> {
        let anchors: HashSet<&str> = profile
            .songs
            .iter()
            .filter(|(_, s)| s.completion_rate >= self.anchor_min_completion)
            .map(|(id, _)| id.as_str())
            .collect();

        let mut sorted: Vec<&ListeningEvent> = events.iter().collect();
        sorted.sort_by_key(|e| e.timestamp_ms);

        let mut affinity: HashMap<String, u64> = HashMap::new();
        for (i, event) in sorted.iter().enumerate() {
            for other in sorted[i + 1..].iter() {
                if other.timestamp_ms - event.timestamp_ms > self.window_ms {
                    break;
                }
                if other.song_id == event.song_id {
                    continue;
                }
                if anchors.contains(event.song_id.as_str()) {
                    *affinity.entry(other.song_id.clone()).or_insert(0) += 1;
                }
                if anchors.contains(other.song_id.as_str()) {
                    *affinity.entry(event.song_id.clone()).or_insert(0) += 1;
                }
            }
        }
        affinity
    }
}

impl ScoringAgent for CollaborativeAgent {
    fn name(&self) -> &'static str {
        "collaborative"
    }

    fn train(
        &mut self,
        profile: &UserProfile,
        events: &[ListeningEvent],
    ) -> Result<AgentTrainingState, TrainError> {
        let distinct = distinct_song_count(events);
        if distinct < self.min_history_songs {
            return Err(TrainError::InsufficientHistory {
                needed: self.min_history_songs,
                got: distinct,
            });
        }

        let affinity = self.build_affinity(events, profile);
        self.max_affinity = affinity.values().copied().max().unwrap_or(0);
        self.anchor_affinity = affinity;
        self.state = AgentTrainingState {
            trained: true,
            last_trained_at_ms: Some(profile.generated_at_ms),
            version: self.state.version + 1,
        };
        debug!(
            pairs = self.anchor_affinity.len(),
            "Collaborative agent trained"
        );
        Ok(self.state.clone())
    }

    fn score(&self, song_ids: &[String], _profile: &UserProfile) -> HashMap<String, f64> {
        if !self.state.trained || self.max_affinity == 0 {
            return neutral_scores(song_ids);
        }
        song_ids
            .iter()
            .map(|id| {
                let score = match self.anchor_affinity.get(id) {
                    Some(count) => *count as f64 / self.max_affinity as f64,
                    // Never seen near an anchor: no evidence either way
                    None => NEUTRAL_SCORE,
                };
                (id.clone(), score)
            })
            .collect()
    }

    fn training_state(&self) -> AgentTrainingState {
        self.state.clone()
    }
}
