//! Derived user profile models.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Aggregated view of one song in the listening history.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SongSnapshot {
    pub artist: String,
    pub genre: Option<String>,
    pub last_played_ms: i64,
    pub play_count: u32,
    /// Average completion rate across this song's events, in [0, 1]
    pub completion_rate: f64,
    /// Fraction of this song's events that were skips, in [0, 1]
    pub skip_rate: f64,
}

/// Derived, ephemeral view of the user's taste. Recomputed per generation
/// cycle; never persisted as authoritative state.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct UserProfile {
    /// (artist, weight) descending, truncated to top-N
    pub top_artists: Vec<(String, f64)>,
    /// (genre, event count) descending, truncated to top-M
    pub top_genres: Vec<(String, u64)>,
    /// Hours of day (UTC) with most listening activity, strongest first
    pub peak_hours: Vec<u8>,
    pub completion_rate_by_song: HashMap<String, f64>,
    pub skip_rate_by_song: HashMap<String, f64>,
    /// Per-song aggregates keyed by song id
    pub songs: HashMap<String, SongSnapshot>,
    /// Most recent event timestamp per artist, used for fusion tie-breaks
    pub last_played_by_artist: HashMap<String, i64>,
    /// Timestamp the profile was derived at (ms)
    pub generated_at_ms: i64,
}

impl UserProfile {
    /// Coarse fingerprint of the profile's top artists and genres.
    ///
    /// Cache keys are scoped to this value so a meaningfully different
    /// profile never serves recommendations computed for an older one, even
    /// inside the TTL window. Deliberately insensitive to weights: only the
    /// identity and order of the top entries matter.
    pub fn epoch(&self) -> String {
        let artists: Vec<&str> = self
            .top_artists
            .iter()
            .take(5)
            .map(|(artist, _)| artist.as_str())
            .collect();
        let genres: Vec<&str> = self
            .top_genres
            .iter()
            .take(3)
            .map(|(genre, _)| genre.as_str())
            .collect();
        format!("{}#{}", artists.join("|"), genres.join("|")).to_lowercase()
    }

    /// True when the profile was derived from an empty log.
    pub fn is_empty(&self) -> bool {
        self.songs.is_empty()
    }
}
