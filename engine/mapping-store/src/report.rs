//! Merge reports

use crate::types::MergeMode;
use player_linkage::{ConfidenceTier, PlayerKey};
use serde::{Deserialize, Serialize};

/// A cache entry whose secondary ID changed at the same or higher confidence
///
/// Often a sign of provider ID churn, so every remap is surfaced for review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Remap {
    pub key: PlayerKey,
    pub player_name: String,
    pub old_secondary_id: String,
    pub new_secondary_id: String,
    pub old_tier: ConfidenceTier,
    pub new_tier: ConfidenceTier,
}

/// A cache entry that collided with a curated entry and was dropped
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conflict {
    pub key: PlayerKey,
    pub curated_secondary_id: String,
    pub cache_secondary_id: String,
}

/// Outcome counts of a single merge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeReport {
    pub mode: MergeMode,

    /// Incoming results by tier
    pub verified: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,

    /// Results whose key belongs to the curated layer
    pub skipped_curated: usize,

    /// Primary records the matcher left unmapped
    pub unmatched: usize,

    /// New cache keys
    pub added: usize,

    /// Keys of the new cache entries, in merge order
    pub added_keys: Vec<PlayerKey>,

    /// Cache entries moved to a strictly higher tier
    pub upgraded: usize,

    /// Same tier and secondary ID, other details (team, primary ID, score) refreshed
    pub updated: usize,

    /// Cache entries left as they were
    pub unchanged: usize,

    /// Lower-tier results that were not allowed to replace an entry
    pub downgrades_refused: usize,

    /// Results dropped because another result in the batch had the same key
    pub key_collisions: usize,

    /// Secondary IDs claimed by more than one key after the merge
    pub shared_targets: usize,

    /// Results dropped by one-to-one validation
    pub duplicate_targets_dropped: usize,

    /// Keys present before a full refresh and absent after it
    pub removed: Vec<PlayerKey>,

    pub remaps: Vec<Remap>,

    pub conflicts: Vec<Conflict>,
}

impl MergeReport {
    pub fn new(mode: MergeMode) -> Self {
        Self {
            mode,
            verified: 0,
            high: 0,
            medium: 0,
            low: 0,
            skipped_curated: 0,
            unmatched: 0,
            added: 0,
            added_keys: Vec::new(),
            upgraded: 0,
            updated: 0,
            unchanged: 0,
            downgrades_refused: 0,
            key_collisions: 0,
            shared_targets: 0,
            duplicate_targets_dropped: 0,
            removed: Vec::new(),
            remaps: Vec::new(),
            conflicts: Vec::new(),
        }
    }

    pub(crate) fn record_tier(&mut self, tier: ConfidenceTier) {
        match tier {
            ConfidenceTier::Verified => self.verified += 1,
            ConfidenceTier::High => self.high += 1,
            ConfidenceTier::Medium => self.medium += 1,
            ConfidenceTier::Low => self.low += 1,
            ConfidenceTier::Unmatched => {}
        }
    }

    pub fn remapped(&self) -> usize {
        self.remaps.len()
    }

    /// Total matched results seen, all tiers
    pub fn matched(&self) -> usize {
        self.verified + self.high + self.medium + self.low
    }

    /// Whether the merge left the cache exactly as it found it
    pub fn is_noop(&self) -> bool {
        self.added == 0
            && self.upgraded == 0
            && self.updated == 0
            && self.remaps.is_empty()
            && self.removed.is_empty()
            && self.conflicts.is_empty()
    }
}
