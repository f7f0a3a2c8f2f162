//! Shared recommendation domain models.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a recommendation came from.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationCategory {
    ArtistBased,
    GenreBased,
    Similar,
    Discovery,
    Trending,
    /// Produced by local score fusion rather than catalog expansion
    LocalPicks,
}

impl RecommendationCategory {
    /// The five catalog-expansion categories, in generation order.
    pub const CATALOG_CATEGORIES: [RecommendationCategory; 5] = [
        RecommendationCategory::ArtistBased,
        RecommendationCategory::GenreBased,
        RecommendationCategory::Similar,
        RecommendationCategory::Discovery,
        RecommendationCategory::Trending,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RecommendationCategory::ArtistBased => "artist_based",
            RecommendationCategory::GenreBased => "genre_based",
            RecommendationCategory::Similar => "similar",
            RecommendationCategory::Discovery => "discovery",
            RecommendationCategory::Trending => "trending",
            RecommendationCategory::LocalPicks => "local_picks",
        }
    }

    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s {
            "artist_based" => Some(RecommendationCategory::ArtistBased),
            "genre_based" => Some(RecommendationCategory::GenreBased),
            "similar" => Some(RecommendationCategory::Similar),
            "discovery" => Some(RecommendationCategory::Discovery),
            "trending" => Some(RecommendationCategory::Trending),
            "local_picks" => Some(RecommendationCategory::LocalPicks),
            _ => None,
        }
    }
}

impl fmt::Display for RecommendationCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A song proposed to the user, prior to being shown.
///
/// Candidates are transient: they are always re-derivable from the event log
/// plus the catalog, and are never a source of truth.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RecommendationCandidate {
    /// Local song id or external catalog id
    pub id: String,
    pub title: String,
    pub artist: String,
    pub thumbnail: Option<String>,
    pub category: RecommendationCategory,
    pub score: f64,
    /// Agreement/quality signal in [0, 1]
    pub confidence: f64,
    /// 1-based position within its batch
    pub rank: u32,
}

/// One full catalog-expansion result: all five categories, each possibly
/// empty. Partial success is a valid, non-error outcome.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct RecommendationBatch {
    pub artist_based: Vec<RecommendationCandidate>,
    pub genre_based: Vec<RecommendationCandidate>,
    pub similar: Vec<RecommendationCandidate>,
    pub discovery: Vec<RecommendationCandidate>,
    pub trending: Vec<RecommendationCandidate>,
}

impl RecommendationBatch {
    pub fn is_empty(&self) -> bool {
        self.artist_based.is_empty()
            && self.genre_based.is_empty()
            && self.similar.is_empty()
            && self.discovery.is_empty()
            && self.trending.is_empty()
    }

    pub fn category(&self, category: RecommendationCategory) -> &[RecommendationCandidate] {
        match category {
            RecommendationCategory::ArtistBased => &self.artist_based,
            RecommendationCategory::GenreBased => &self.genre_based,
            RecommendationCategory::Similar => &self.similar,
            RecommendationCategory::Discovery => &self.discovery,
            RecommendationCategory::Trending => &self.trending,
            RecommendationCategory::LocalPicks => &[],
        }
    }

    pub fn set_category(
        &mut self,
        category: RecommendationCategory,
        candidates: Vec<RecommendationCandidate>,
    ) {
        match category {
            RecommendationCategory::ArtistBased => self.artist_based = candidates,
            RecommendationCategory::GenreBased => self.genre_based = candidates,
            RecommendationCategory::Similar => self.similar = candidates,
            RecommendationCategory::Discovery => self.discovery = candidates,
            RecommendationCategory::Trending => self.trending = candidates,
            RecommendationCategory::LocalPicks => {}
        }
    }
}
