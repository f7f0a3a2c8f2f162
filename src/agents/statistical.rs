//! Statistical agent: scores songs from the user's own listening patterns.
//!
//! The score for a known song combines its engagement (completion, skips,
//! play count) with an exponential recency decay and the artist's overall
//! standing in the profile. Songs the user has never played score neutral.

use super::{
    distinct_song_count, neutral_scores, AgentTrainingState, ScoringAgent, TrainError,
    NEUTRAL_SCORE,
};
use crate::analytics::UserProfile;
use crate::events::ListeningEvent;
use std::collections::HashMap;
use tracing::debug;

/// Recency half-life: a song unplayed for this long loses half its recency
/// contribution.
const HALF_LIFE_DAYS: f64 = 23.0;

const DAY_MS: f64 = 86_400_000.0;

pub struct StatisticalAgent {
    min_history_songs: usize,
    state: AgentTrainingState,
}

impl StatisticalAgent {
    pub fn new(min_history_songs: usize) -> Self {
        Self {
            min_history_songs,
            state: AgentTrainingState::default(),
        }
    }

    fn song_score(&self, song_id: &str, profile: &UserProfile) -> f64 {
        let Some(snapshot) = profile.songs.get(song_id) else {
            return NEUTRAL_SCORE;
        };

        let engagement = 0.5 * snapshot.completion_rate
            + 0.3 * (1.0 - snapshot.skip_rate)
            + 0.2 * (snapshot.play_count as f64 / 10.0).min(1.0);

        let age_days =
            ((profile.generated_at_ms - snapshot.last_played_ms).max(0) as f64) / DAY_MS;
        let decay = (-std::f64::consts::LN_2 * age_days / HALF_LIFE_DAYS).exp();

        let max_weight = profile
            .top_artists
            .first()
            .map(|(_, w)| *w)
            .unwrap_or(0.0);
        let artist_affinity = if max_weight > 0.0 {
            profile
                .top_artists
                .iter()
                .find(|(artist, _)| *artist == snapshot.artist)
                .map(|(_, w)| w / max_weight)
                .unwrap_or(0.0)
        } else {
            0.0
        };

        let score = 0.7 * engagement * (0.5 + 0.5 * decay) + 0.3 * artist_affinity;
        score.clamp(0.0, 1.0)
    }
}

impl ScoringAgent for StatisticalAgent {
    fn name(&self) -> &'static str {
        "statistical"
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

        // All scoring state lives in the profile; training just flips the gate.
        self.state = AgentTrainingState {
            trained: true,
            last_trained_at_ms: Some(profile.generated_at_ms),
            version: self.state.version + 1,
        };
        debug!(distinct_songs = distinct, "Statistical agent trained");
        Ok(self.state.clone())
    }

    fn score(&self, song_ids: &[String], profile: &UserProfile) -> HashMap<String, f64> {
        if !self.state.trained {
            return neutral_scores(song_ids);
        }
        song_ids
            .iter()
            .map(|id| (id.clone(), self.song_score(id, profile)))
            .collect()
    }

    fn training_state(&self) -> AgentTrainingState {
        self.state.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::SongSnapshot;

    fn profile_with(songs: Vec<(&str, SongSnapshot)>) -> UserProfile {
        let songs: HashMap<String, SongSnapshot> = songs
            .into_iter()
            .map(|(id, s)| (id.to_string(), s))
            .collect();
        let generated = songs
            .values()
            .map(|s| s.last_played_ms)
            .max()
            .unwrap_or(0);
        UserProfile {
            songs,
            generated_at_ms: generated,
            ..Default::default()
        }
    }

    fn snapshot(artist: &str, last_played_ms: i64, completion: f64, skip: f64) -> SongSnapshot {
        SongSnapshot {
            artist: artist.to_string(),
            genre: None,
            last_played_ms,
            play_count: 5,
            completion_rate: completion,
            skip_rate: skip,
        }
    }

    fn events(count: usize) -> Vec<ListeningEvent> {
        (0..count)
            .map(|i| ListeningEvent {
                id: None,
                song_id: format!("s{i}"),
                artist: "A".to_string(),
                genre: None,
                timestamp_ms: i as i64,
                play_duration_sec: 100,
                total_duration_sec: 100,
                play_count: 1,
                skipped: false,
            })
            .collect()
    }

    #[test]
    fn test_untrained_scores_neutral() {
        let agent = StatisticalAgent::new(5);
        let scores = agent.score(&["x".to_string()], &UserProfile::default());
        assert_eq!(scores["x"], NEUTRAL_SCORE);
        assert!(!agent.is_trained());
    }

    #[test]
    fn test_train_requires_min_history() {
        let mut agent = StatisticalAgent::new(5);
        let err = agent
            .train(&UserProfile::default(), &events(4))
            .unwrap_err();
        assert!(matches!(
            err,
            TrainError::InsufficientHistory { needed: 5, got: 4 }
        ));
        assert!(!agent.is_trained());

        let state = agent.train(&UserProfile::default(), &events(5)).unwrap();
        assert!(state.trained);
        assert_eq!(state.version, 1);
    }

    #[test]
    fn test_loved_song_beats_skipped_song() {
        let profile = profile_with(vec![
            ("loved", snapshot("A", 1_000, 0.95, 0.0)),
            ("skipped", snapshot("B", 1_000, 0.1, 0.9)),
        ]);
        let mut agent = StatisticalAgent::new(1);
        agent.train(&profile, &events(5)).unwrap();

        let ids = vec!["loved".to_string(), "skipped".to_string()];
        let scores = agent.score(&ids, &profile);
        assert!(scores["loved"] > scores["skipped"]);
    }

    #[test]
    fn test_recency_decay_halves_at_half_life() {
        let day = DAY_MS as i64;
        let profile = profile_with(vec![
            ("fresh", snapshot("A", 23 * day, 0.8, 0.0)),
            ("stale", snapshot("A", 0, 0.8, 0.0)),
        ]);
        let mut agent = StatisticalAgent::new(1);
        agent.train(&profile, &events(5)).unwrap();

        let ids = vec!["fresh".to_string(), "stale".to_string()];
        let scores = agent.score(&ids, &profile);
        assert!(scores["fresh"] > scores["stale"]);

        // Engagement with full decay vs half decay: 0.7*e*(1.0) vs 0.7*e*(0.75)
        let engagement = 0.5 * 0.8 + 0.3 + 0.2 * 0.5;
        assert!((scores["fresh"] - 0.7 * engagement).abs() < 1e-9);
        assert!((scores["stale"] - 0.7 * engagement * 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_unknown_song_scores_neutral_when_trained() {
        let profile = profile_with(vec![("known", snapshot("A", 0, 0.8, 0.0))]);
        let mut agent = StatisticalAgent::new(1);
        agent.train(&profile, &events(5)).unwrap();

        let scores = agent.score(&["mystery".to_string()], &profile);
        assert_eq!(scores["mystery"], NEUTRAL_SCORE);
    }
}
