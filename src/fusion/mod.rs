//! Deterministic score fusion.
//!
//! Takes the per-agent score maps for one candidate batch and produces a
//! single ranked list. Per-agent scores are min-max normalized over the
//! batch, combined as a weighted average, and annotated with a consensus
//! confidence. The final ordering is a total order so equal inputs always
//! produce identical output.

use crate::analytics::UserProfile;
use crate::config::FusionSettings;
use crate::model::{RecommendationCandidate, RecommendationCategory};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

pub struct FusionAgent {
    settings: FusionSettings,
}

impl FusionAgent {
    pub fn new(settings: FusionSettings) -> Self {
        Self { settings }
    }

    pub fn with_defaults() -> Self {
        Self::new(FusionSettings::default())
    }

    /// Fuse per-agent scores into a ranked candidate list.
    ///
    /// `per_agent` maps agent name to that agent's scores for `candidates`.
    /// With no participating agents this falls back to ranking the user's
    /// own history by recency and play count.
    pub fn fuse(
        &self,
        per_agent: &BTreeMap<String, HashMap<String, f64>>,
        candidates: &[String],
        profile: &UserProfile,
        limit: usize,
    ) -> Vec<RecommendationCandidate> {
        if candidates.is_empty() || limit == 0 {
            return Vec::new();
        }
        if per_agent.is_empty() {
            debug!("No trained agents, falling back to history ranking");
            return self.fallback_ranking(candidates, profile, limit);
        }

        let normalized: BTreeMap<&str, HashMap<&str, f64>> = per_agent
            .iter()
            .map(|(name, scores)| (name.as_str(), normalize(candidates, scores)))
            .collect();

        // Own top-K per agent, for the consensus confidence
        let top_k = ((candidates.len() as f64) * self.settings.top_k_fraction).ceil() as usize;
        let top_k = top_k.max(1);
        let top_sets: BTreeMap<&str, Vec<&str>> = normalized
            .iter()
            .map(|(name, scores)| (*name, top_ids(scores, top_k)))
            .collect();

        let mut ranked: Vec<RecommendationCandidate> = candidates
            .iter()
            .map(|id| {
                let mut weighted_sum = 0.0;
                let mut weight_total = 0.0;
                let mut in_top = 0usize;
                for (name, scores) in &normalized {
                    let weight = self
                        .settings
                        .agent_weights
                        .get(*name)
                        .copied()
                        .unwrap_or(1.0);
                    weighted_sum += weight * scores.get(id.as_str()).copied().unwrap_or(0.5);
                    weight_total += weight;
                    if top_sets[name].contains(&id.as_str()) {
                        in_top += 1;
                    }
                }
                let score = if weight_total > 0.0 {
                    weighted_sum / weight_total
                } else {
                    0.5
                };
                let confidence = in_top as f64 / normalized.len() as f64;
                self.candidate(id, profile, score, confidence)
            })
            .collect();

        sort_total_order(&mut ranked, profile);
        ranked.truncate(limit);
        assign_ranks(&mut ranked);
        ranked
    }

    /// Cold-start ordering: the user's own songs by recency and play count.
    fn fallback_ranking(
        &self,
        candidates: &[String],
        profile: &UserProfile,
        limit: usize,
    ) -> Vec<RecommendationCandidate> {
        let max_plays = profile
            .songs
            .values()
            .map(|s| s.play_count)
            .max()
            .unwrap_or(0) as f64;
        let newest = profile.generated_at_ms.max(1) as f64;

        let mut ranked: Vec<RecommendationCandidate> = candidates
            .iter()
            .map(|id| {
                let score = match profile.songs.get(id) {
                    Some(snapshot) => {
                        let recency = (snapshot.last_played_ms.max(0) as f64 / newest).min(1.0);
                        let popularity = if max_plays > 0.0 {
                            snapshot.play_count as f64 / max_plays
                        } else {
                            0.0
                        };
                        0.6 * recency + 0.4 * popularity
                    }
                    None => 0.0,
                };
                self.candidate(id, profile, score, 0.0)
            })
            .collect();

        sort_total_order(&mut ranked, profile);
        ranked.truncate(limit);
        assign_ranks(&mut ranked);
        ranked
    }

    fn candidate(
        &self,
        song_id: &str,
        profile: &UserProfile,
        score: f64,
        confidence: f64,
    ) -> RecommendationCandidate {
        let artist = profile
            .songs
            .get(song_id)
            .map(|s| s.artist.clone())
            .unwrap_or_default();
        RecommendationCandidate {
            id: song_id.to_string(),
            title: song_id.to_string(),
            artist,
            thumbnail: None,
            category: RecommendationCategory::LocalPicks,
            score,
            confidence,
            rank: 0,
        }
    }
}

/// Min-max normalize one agent's scores over the batch. A uniform batch maps
/// to 0.5 everywhere so it neither dominates nor vanishes.
fn normalize<'a>(candidates: &'a [String], scores: &HashMap<String, f64>) -> HashMap<&'a str, f64> {
    let raw: Vec<f64> = candidates
        .iter()
        .map(|id| scores.get(id).copied().unwrap_or(0.5))
        .collect();
    let min = raw.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = raw.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let span = max - min;

    candidates
        .iter()
        .zip(raw)
        .map(|(id, value)| {
            let normalized = if span > f64::EPSILON {
                (value - min) / span
            } else {
                0.5
            };
            (id.as_str(), normalized)
        })
        .collect()
}

fn top_ids<'a>(scores: &HashMap<&'a str, f64>, k: usize) -> Vec<&'a str> {
    let mut ids: Vec<(&str, f64)> = scores.iter().map(|(id, s)| (*id, *s)).collect();
    ids.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.0.cmp(b.0))
    });
    ids.into_iter().take(k).map(|(id, _)| id).collect()
}

/// Total order: score desc, confidence desc, artist recency desc, id asc.
fn sort_total_order(candidates: &mut [RecommendationCandidate], profile: &UserProfile) {
    candidates.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| {
                b.confidence
                    .partial_cmp(&a.confidence)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .then_with(|| {
                let a_recency = profile.last_played_by_artist.get(&a.artist).copied();
                let b_recency = profile.last_played_by_artist.get(&b.artist).copied();
                b_recency.cmp(&a_recency)
            })
            .then_with(|| a.id.cmp(&b.id))
    });
}

fn assign_ranks(candidates: &mut [RecommendationCandidate]) {
    for (i, candidate) in candidates.iter_mut().enumerate() {
        candidate.rank = (i + 1) as u32;
    }
}
