//! Configuration for the scorer and matcher

use crate::error::{LinkageError, Result};
use crate::types::{ConfidenceTier, Position};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Default bonus added when both records share a real team
pub const DEFAULT_TEAM_BONUS: f64 = 0.3;

/// Name similarity metric used for the base score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimilarityMetric {
    /// Ratcliff/Obershelp matching-blocks ratio (2M / T)
    #[default]
    Gestalt,
    /// 1 - levenshtein / max(len)
    Levenshtein,
    JaroWinkler,
}

/// Score cut-offs for confidence tiers; a score must be strictly above a cut-off
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TierThresholds {
    pub high: f64,
    pub medium: f64,
    pub low: f64,
}

impl Default for TierThresholds {
    fn default() -> Self {
        Self { high: 0.85, medium: 0.70, low: 0.60 }
    }
}

impl TierThresholds {
    /// Tier for a score that has already been clamped to [0, 1]
    pub fn tier_for(&self, score: f64) -> ConfidenceTier {
        if score > self.high {
            ConfidenceTier::High
        } else if score > self.medium {
            ConfidenceTier::Medium
        } else if score > self.low {
            ConfidenceTier::Low
        } else {
            ConfidenceTier::Unmatched
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.low < self.medium && self.medium < self.high && self.high <= 1.0) {
            return Err(LinkageError::config(format!(
                "tier thresholds must satisfy low < medium < high <= 1.0 (got {} / {} / {})",
                self.low, self.medium, self.high
            )));
        }
        if self.low < 0.0 {
            return Err(LinkageError::config("low threshold must not be negative"));
        }
        Ok(())
    }
}

/// Configuration for the similarity scorer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScorerConfig {
    pub metric: SimilarityMetric,

    /// Added when both records have the same non-FA team
    pub team_bonus: f64,

    pub thresholds: TierThresholds,
}

impl Default for ScorerConfig {
    fn default() -> Self {
        Self {
            metric: SimilarityMetric::default(),
            team_bonus: DEFAULT_TEAM_BONUS,
            thresholds: TierThresholds::default(),
        }
    }
}

/// Configuration for the two-phase matcher
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatcherConfig {
    pub scorer: ScorerConfig,

    /// Groups of positions treated as the same for the position filter
    pub position_equivalences: Vec<Vec<Position>>,

    /// When set, records at other positions are ignored entirely
    pub eligible_positions: Option<Vec<Position>>,

    /// Skip primary records whose team is "FA"
    pub skip_free_agents: bool,

    /// Run the fuzzy pass on the rayon thread pool
    pub parallel: bool,

    /// Extra team aliases (alias -> canonical code)
    pub team_aliases: BTreeMap<String, String>,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            scorer: ScorerConfig::default(),
            position_equivalences: vec![vec![Position::RB, Position::FB]],
            eligible_positions: None,
            skip_free_agents: false,
            parallel: false,
            team_aliases: BTreeMap::new(),
        }
    }
}

impl MatcherConfig {
    /// Whether two canonical positions pass the position filter
    pub fn positions_compatible(&self, a: &Position, b: &Position) -> bool {
        a == b
            || self
                .position_equivalences
                .iter()
                .any(|group| group.contains(a) && group.contains(b))
    }

    pub fn is_eligible(&self, position: &Position) -> bool {
        match &self.eligible_positions {
            Some(positions) => positions.contains(position),
            None => true,
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.scorer.thresholds.validate()?;

        if self.scorer.team_bonus < 0.0 {
            return Err(LinkageError::config("team bonus must not be negative"));
        }

        if matches!(&self.eligible_positions, Some(positions) if positions.is_empty()) {
            return Err(LinkageError::config("eligible_positions must not be empty when set"));
        }

        Ok(())
    }
}
