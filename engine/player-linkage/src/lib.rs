//! Player Linkage - Matches fantasy football players across data providers
//!
//! Given the roster of a primary provider and the roster of a secondary provider,
//! this crate decides which records describe the same athlete. It is a pure,
//! synchronous batch computation: rosters are fetched elsewhere and handed in.
//!
//! ## Pipeline
//!
//! - **Normalizer**: canonical name key, position and team for each record
//! - **SimilarityScorer**: name similarity plus a same-team bonus
//! - **Matcher**: curated priority pass, then a position-filtered fuzzy pass

pub mod config;
pub mod error;
pub mod matcher;
pub mod normalize;
pub mod similarity;
pub mod types;

#[cfg(test)]
mod integration_tests;

pub use config::{MatcherConfig, ScorerConfig, SimilarityMetric, TierThresholds};
pub use error::{LinkageError, Result};
pub use matcher::{CuratedIdentity, MatchOutcome, Matcher, UnmatchedRecord};
pub use normalize::{normalize, normalize_name, normalize_position, normalize_team, Normalizer};
pub use similarity::SimilarityScorer;
pub use types::{
    ConfidenceTier, MatchResult, NormalizedRecord, PlayerKey, PlayerRecord, Position,
    RawPlayerRecord, FREE_AGENT,
};
