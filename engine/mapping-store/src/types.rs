use chrono::{DateTime, Utc};
use player_linkage::{ConfidenceTier, PlayerKey, Position};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which layer a mapping entry belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    /// Manually verified; never touched by automated refreshes
    Curated,
    /// Produced by automated refreshes
    Cache,
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Origin::Curated => write!(f, "curated"),
            Origin::Cache => write!(f, "cache"),
        }
    }
}

/// A single player mapping from the primary provider to the secondary provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappingEntry {
    /// Store key (normalized name + position)
    pub key: PlayerKey,

    /// Display name (e.g. "Justin Jefferson")
    pub player_name: String,

    /// Primary provider ID, when known. Curated entries do not record it.
    pub primary_id: Option<String>,

    /// Secondary provider ID
    pub secondary_id: String,

    pub position: Position,

    pub team: String,

    pub confidence_tier: ConfidenceTier,

    pub origin: Origin,

    /// Clamped similarity score of the match that produced this entry
    pub match_score: f64,

    /// Additional display names (curated only)
    pub aliases: Vec<String>,

    /// When automation last wrote this entry (cache only)
    pub last_updated: Option<DateTime<Utc>>,
}

impl MappingEntry {
    pub fn is_curated(&self) -> bool {
        self.origin == Origin::Curated
    }
}

/// How a merge treats the existing cache layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeMode {
    /// Union with the existing cache
    Incremental,
    /// Discard the cache, then merge the fresh results
    Full,
}

impl fmt::Display for MergeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MergeMode::Incremental => write!(f, "incremental"),
            MergeMode::Full => write!(f, "full"),
        }
    }
}
