//! Listening analytics: derives a [`UserProfile`] from the event log.
//!
//! `compute_profile` is a pure function of its input events. Callers bound
//! the window (most recent K events) for performance; correctness does not
//! depend on window size.

mod profile;

pub use profile::{SongSnapshot, UserProfile};

use crate::config::AnalyticsSettings;
use crate::events::ListeningEvent;
use chrono::{DateTime, Timelike};
use std::collections::{HashMap, HashSet};

pub struct AnalyticsEngine {
    settings: AnalyticsSettings,
}

impl AnalyticsEngine {
    pub fn new(settings: AnalyticsSettings) -> Self {
        Self { settings }
    }

    pub fn with_defaults() -> Self {
        Self::new(AnalyticsSettings::default())
    }

    /// True iff the log contains at least `min_distinct_songs` distinct songs.
    /// This is the sole gate deciding whether local scoring agents may run.
    pub fn has_enough_history(events: &[ListeningEvent], min_distinct_songs: usize) -> bool {
        let distinct: HashSet<&str> = events.iter().map(|e| e.song_id.as_str()).collect();
        distinct.len() >= min_distinct_songs
    }

    /// Derive a profile from listening events. Pure; no hidden state.
    pub fn compute_profile(&self, events: &[ListeningEvent]) -> UserProfile {
        let mut songs: HashMap<String, SongAccumulator> = HashMap::new();
        let mut artist_weight: HashMap<String, f64> = HashMap::new();
        let mut artist_last_played: HashMap<String, i64> = HashMap::new();
        let mut genre_counts: HashMap<String, u64> = HashMap::new();
        let mut hour_counts: [u64; 24] = [0; 24];
        let mut latest_ms: i64 = 0;

        for event in events {
            latest_ms = latest_ms.max(event.timestamp_ms);

            // Artist weight = Σ play_count + Σ round(completion_rate * 10)
            *artist_weight.entry(event.artist.clone()).or_insert(0.0) +=
                event.play_count as f64 + (event.completion_rate() * 10.0).round();

            let last = artist_last_played.entry(event.artist.clone()).or_insert(0);
            *last = (*last).max(event.timestamp_ms);

            if let Some(genre) = &event.genre {
                *genre_counts.entry(genre.clone()).or_insert(0) += 1;
            }

            if let Some(dt) = DateTime::from_timestamp_millis(event.timestamp_ms) {
                hour_counts[dt.hour() as usize] += 1;
            }

            let acc = songs
                .entry(event.song_id.clone())
                .or_insert_with(|| SongAccumulator::new(event));
            acc.add(event);
        }

        // Top artists: weight descending, ties by most recent event, then name
        let mut top_artists: Vec<(String, f64)> = artist_weight.into_iter().collect();
        top_artists.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| {
                    let a_last = artist_last_played.get(&a.0).copied().unwrap_or(0);
                    let b_last = artist_last_played.get(&b.0).copied().unwrap_or(0);
                    b_last.cmp(&a_last)
                })
                .then_with(|| a.0.cmp(&b.0))
        });
        top_artists.truncate(self.settings.top_artists);

        let mut top_genres: Vec<(String, u64)> = genre_counts.into_iter().collect();
        top_genres.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        top_genres.truncate(self.settings.top_genres);

        let mut peak_hours: Vec<u8> = (0u8..24)
            .filter(|&h| hour_counts[h as usize] > 0)
            .collect();
        peak_hours.sort_by(|a, b| {
            hour_counts[*b as usize]
                .cmp(&hour_counts[*a as usize])
                .then_with(|| a.cmp(b))
        });
        peak_hours.truncate(self.settings.peak_hours);

        let songs: HashMap<String, SongSnapshot> = songs
            .into_iter()
            .map(|(song_id, acc)| (song_id, acc.finish()))
            .collect();

        let completion_rate_by_song = songs
            .iter()
            .map(|(id, snapshot)| (id.clone(), snapshot.completion_rate))
            .collect();
        let skip_rate_by_song = songs
            .iter()
            .map(|(id, snapshot)| (id.clone(), snapshot.skip_rate))
            .collect();

        UserProfile {
            top_artists,
            top_genres,
            peak_hours,
            completion_rate_by_song,
            skip_rate_by_song,
            songs,
            last_played_by_artist: artist_last_played,
            generated_at_ms: latest_ms,
        }
    }
}

struct SongAccumulator {
    artist: String,
    genre: Option<String>,
    last_played_ms: i64,
    play_count: u32,
    completion_sum: f64,
    skip_count: u32,
    event_count: u32,
}

impl SongAccumulator {
    fn new(event: &ListeningEvent) -> Self {
        Self {
            artist: event.artist.clone(),
            genre: event.genre.clone(),
            last_played_ms: 0,
            play_count: 0,
            completion_sum: 0.0,
            skip_count: 0,
            event_count: 0,
        }
    }

    fn add(&mut self, event: &ListeningEvent) {
        if event.timestamp_ms >= self.last_played_ms {
            self.last_played_ms = event.timestamp_ms;
            // Later events carry fresher metadata
            self.artist = event.artist.clone();
            if event.genre.is_some() {
                self.genre = event.genre.clone();
            }
        }
        self.play_count += event.play_count;
        self.completion_sum += event.completion_rate();
        if event.skipped {
            self.skip_count += 1;
        }
        self.event_count += 1;
    }

    fn finish(self) -> SongSnapshot {
        let events = self.event_count.max(1) as f64;
        SongSnapshot {
            artist: self.artist,
            genre: self.genre,
            last_played_ms: self.last_played_ms,
            play_count: self.play_count,
            completion_rate: (self.completion_sum / events).clamp(0.0, 1.0),
            skip_rate: (self.skip_count as f64 / events).clamp(0.0, 1.0),
        }
    }
}
