use anyhow::Context;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

/// Optional TOML configuration file. Every field is optional; absent fields
/// keep their built-in defaults.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct FileConfig {
    pub top_artists: Option<usize>,
    pub top_genres: Option<usize>,
    pub min_history_songs: Option<usize>,
    pub window_events: Option<usize>,
    pub top_k_fraction: Option<f64>,
    pub agent_weights: Option<HashMap<String, f64>>,
    pub cache_ttl_hours: Option<u64>,
    pub request_timeout_sec: Option<u64>,
    pub max_concurrent_requests: Option<usize>,
    pub min_training_events: Option<usize>,
}

impl FileConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Could not read config file {:?}", path))?;
        toml::from_str(&raw).with_context(|| format!("Could not parse config file {:?}", path))
    }
}
