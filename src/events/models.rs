//! Listening event data model.

use serde::{Deserialize, Serialize};

/// One playback occurrence. Immutable once written; corrections are new
/// events, never mutations of history.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ListeningEvent {
    pub id: Option<i64>,
    pub song_id: String,
    pub artist: String,
    pub genre: Option<String>,
    /// Unix timestamp in milliseconds when playback started
    pub timestamp_ms: i64,
    /// Actual listening time in seconds
    pub play_duration_sec: u32,
    /// Total track duration in seconds (for completion calculation)
    pub total_duration_sec: u32,
    /// Play count increment carried by this event
    pub play_count: u32,
    pub skipped: bool,
}

impl ListeningEvent {
    /// Fraction of the track that was played, clamped to [0, 1].
    /// A zero total duration yields 0.0.
    pub fn completion_rate(&self) -> f64 {
        if self.total_duration_sec == 0 {
            return 0.0;
        }
        (self.play_duration_sec as f64 / self.total_duration_sec as f64).clamp(0.0, 1.0)
    }
}

/// Filter for querying the event log.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    /// Only events at or after this timestamp (ms)
    pub since_ms: Option<i64>,
    /// Only events for this song
    pub song_id: Option<String>,
    /// Keep only the most recent N events (by timestamp)
    pub limit: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(play: u32, total: u32) -> ListeningEvent {
        ListeningEvent {
            id: None,
            song_id: "s1".to_string(),
            artist: "Artist".to_string(),
            genre: None,
            timestamp_ms: 0,
            play_duration_sec: play,
            total_duration_sec: total,
            play_count: 1,
            skipped: false,
        }
    }

    #[test]
    fn test_completion_rate_basic() {
        assert!((event(90, 180).completion_rate() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_completion_rate_clamped() {
        // Play duration can exceed total when the track loops
        assert_eq!(event(400, 180).completion_rate(), 1.0);
    }

    #[test]
    fn test_completion_rate_zero_duration() {
        assert_eq!(event(30, 0).completion_rate(), 0.0);
    }
}
