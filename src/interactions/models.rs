use crate::model::RecommendationCategory;
use serde::{Deserialize, Serialize};

/// What the user did with a recommended song.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum InteractionAction {
    Played,
    Skipped,
    Liked,
    Disliked,
}

impl InteractionAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            InteractionAction::Played => "played",
            InteractionAction::Skipped => "skipped",
            InteractionAction::Liked => "liked",
            InteractionAction::Disliked => "disliked",
        }
    }

    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s {
            "played" => Some(InteractionAction::Played),
            "skipped" => Some(InteractionAction::Skipped),
            "liked" => Some(InteractionAction::Liked),
            "disliked" => Some(InteractionAction::Disliked),
            _ => None,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RecommendationInteraction {
    pub id: Option<i64>,
    pub song_id: String,
    pub category: RecommendationCategory,
    pub action: InteractionAction,
    pub timestamp_ms: i64,
}

/// Per-category action counters.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CategoryStats {
    pub played: u64,
    pub skipped: u64,
    pub liked: u64,
    pub disliked: u64,
}

impl CategoryStats {
    pub fn total(&self) -> u64 {
        self.played + self.skipped + self.liked + self.disliked
    }

    /// Fraction of interactions that were positive (played or liked).
    /// None until the category has any interactions.
    pub fn positive_rate(&self) -> Option<f64> {
        let total = self.total();
        if total == 0 {
            return None;
        }
        Some((self.played + self.liked) as f64 / total as f64)
    }
}
