//! Engine configuration.
//!
//! Settings structs with defaults for every subsystem, plus an optional TOML
//! file config whose values override the defaults.

mod file_config;

pub use file_config::FileConfig;

use std::collections::HashMap;
use std::path::PathBuf;

#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    pub analytics: AnalyticsSettings,
    pub fusion: FusionSettings,
    pub cache: CacheSettings,
    pub catalog: CatalogSettings,
    pub training: TrainingSettings,
}

impl EngineConfig {
    /// Resolve configuration from defaults and an optional TOML file config.
    /// File values override defaults where present.
    pub fn resolve(file_config: Option<FileConfig>) -> Self {
        let file = file_config.unwrap_or_default();
        let mut config = Self::default();

        if let Some(v) = file.top_artists {
            config.analytics.top_artists = v;
        }
        if let Some(v) = file.top_genres {
            config.analytics.top_genres = v;
        }
        if let Some(v) = file.min_history_songs {
            config.analytics.min_history_songs = v;
        }
        if let Some(v) = file.window_events {
            config.analytics.window_events = v;
        }
        if let Some(v) = file.top_k_fraction {
            config.fusion.top_k_fraction = v;
        }
        if let Some(v) = file.agent_weights {
            config.fusion.agent_weights = v;
        }
        if let Some(v) = file.cache_ttl_hours {
            config.cache.ttl_hours = v;
        }
        if let Some(v) = file.request_timeout_sec {
            config.catalog.request_timeout_sec = v;
        }
        if let Some(v) = file.max_concurrent_requests {
            config.catalog.max_concurrent_requests = v;
        }
        if let Some(v) = file.min_training_events {
            config.training.min_events = v;
        }

        config
    }
}

/// Profile derivation settings.
#[derive(Debug, Clone)]
pub struct AnalyticsSettings {
    /// Top-N artists kept in the profile
    pub top_artists: usize,
    /// Top-M genres kept in the profile
    pub top_genres: usize,
    /// Number of peak listening hours kept
    pub peak_hours: usize,
    /// Distinct songs required before local agents may run
    pub min_history_songs: usize,
    /// Most-recent-K event window used when deriving profiles
    pub window_events: usize,
}

impl Default for AnalyticsSettings {
    fn default() -> Self {
        Self {
            top_artists: 10,
            top_genres: 5,
            peak_hours: 3,
            min_history_songs: 5,
            window_events: 500,
        }
    }
}

/// Score fusion settings.
#[derive(Debug, Clone)]
pub struct FusionSettings {
    /// Per-agent fusion weights by agent name; missing agents get 1.0
    pub agent_weights: HashMap<String, f64>,
    /// Fraction of a batch counted as an agent's "own top-K" for consensus
    pub top_k_fraction: f64,
}

impl Default for FusionSettings {
    fn default() -> Self {
        Self {
            agent_weights: HashMap::new(),
            top_k_fraction: 0.2,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    /// Default TTL for catalog category entries
    pub ttl_hours: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self { ttl_hours: 24 }
    }
}

/// Catalog expansion settings: seeds, caps and network behavior.
#[derive(Debug, Clone)]
pub struct CatalogSettings {
    /// Top artists used as seeds for the artist-based category
    pub artist_seeds: usize,
    /// Songs kept per seed artist
    pub per_artist_cap: usize,
    pub artist_total_cap: usize,
    /// Top genres used as seeds for the genre-based category
    pub genre_seeds: usize,
    /// Playlists expanded to tracks per seed genre
    pub playlists_per_genre: usize,
    pub genre_total_cap: usize,
    /// Recent high-completion songs used as seeds for the similar category
    pub similar_seeds: usize,
    /// Completion rate a song must exceed to seed the similar category
    pub similar_seed_min_completion: f64,
    pub similar_total_cap: usize,
    /// Related artists expanded for the discovery category
    pub discovery_artists: usize,
    pub discovery_total_cap: usize,
    pub trending_total_cap: usize,
    /// Per-request deadline for catalog calls
    pub request_timeout_sec: u64,
    /// Bounded fan-out across seeds within one category
    pub max_concurrent_requests: usize,
}

impl Default for CatalogSettings {
    fn default() -> Self {
        Self {
            artist_seeds: 5,
            per_artist_cap: 5,
            artist_total_cap: 20,
            genre_seeds: 3,
            playlists_per_genre: 2,
            genre_total_cap: 15,
            similar_seeds: 10,
            similar_seed_min_completion: 0.6,
            similar_total_cap: 20,
            discovery_artists: 5,
            discovery_total_cap: 15,
            trending_total_cap: 20,
            request_timeout_sec: 15,
            max_concurrent_requests: 3,
        }
    }
}

/// Agent training settings.
#[derive(Debug, Clone)]
pub struct TrainingSettings {
    /// Minimum events an agent needs before training succeeds
    pub min_events: usize,
    /// Proximity window for collaborative co-occurrence pairing
    pub cooccurrence_window_ms: i64,
    /// Completion rate above which a song anchors collaborative scoring
    pub anchor_min_completion: f64,
}

impl Default for TrainingSettings {
    fn default() -> Self {
        Self {
            min_events: 5,
            cooccurrence_window_ms: 30 * 60 * 1000,
            anchor_min_completion: 0.7,
        }
    }
}

/// Database path helpers for on-disk deployments.
#[derive(Debug, Clone)]
pub struct StoragePaths {
    pub db_dir: PathBuf,
}

impl StoragePaths {
    pub fn new(db_dir: PathBuf) -> Self {
        Self { db_dir }
    }

    pub fn events_db_path(&self) -> PathBuf {
        self.db_dir.join("events.db")
    }

    pub fn interactions_db_path(&self) -> PathBuf {
        self.db_dir.join("interactions.db")
    }
}
