use crate::error::LinkageError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Team code used for players without a team
pub const FREE_AGENT: &str = "FA";

/// Roster position, with provider aliases folded onto one variant
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Position {
    QB,
    RB,
    FB,
    WR,
    TE,
    K,
    DST,
    DL,
    LB,
    DB,
    /// Any code we do not recognise, upper-cased
    Other(String),
}

impl Position {
    /// Canonical short code (e.g. "QB", "DST")
    pub fn as_str(&self) -> &str {
        match self {
            Position::QB => "QB",
            Position::RB => "RB",
            Position::FB => "FB",
            Position::WR => "WR",
            Position::TE => "TE",
            Position::K => "K",
            Position::DST => "DST",
            Position::DL => "DL",
            Position::LB => "LB",
            Position::DB => "DB",
            Position::Other(code) => code,
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for Position {
    fn from(code: String) -> Self {
        crate::normalize::normalize_position(&code)
    }
}

impl From<&str> for Position {
    fn from(code: &str) -> Self {
        crate::normalize::normalize_position(code)
    }
}

impl From<Position> for String {
    fn from(position: Position) -> Self {
        position.as_str().to_string()
    }
}

/// A player record as delivered by a provider, before validation
///
/// Providers routinely omit fields, so everything is optional here.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawPlayerRecord {
    #[serde(alias = "id", alias = "player_id", alias = "espn_id")]
    pub source_id: Option<String>,

    #[serde(alias = "full_name")]
    pub name: Option<String>,

    pub position: Option<String>,
    pub team: Option<String>,
}

/// A validated provider record. Immutable once fetched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerRecord {
    /// Identifier, unique within its provider
    pub source_id: String,

    /// Display name (e.g. "Patrick Mahomes")
    pub name: String,

    /// Position as reported by the provider, canonicalised
    pub position: Position,

    /// Team abbreviation, or "FA"
    pub team: String,
}

impl PlayerRecord {
    /// Create a new player record
    pub fn new(
        source_id: impl Into<String>,
        name: impl Into<String>,
        position: impl Into<Position>,
        team: impl Into<String>,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            name: name.into(),
            position: position.into(),
            team: team.into(),
        }
    }
}

fn required(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

impl TryFrom<RawPlayerRecord> for PlayerRecord {
    type Error = LinkageError;

    fn try_from(raw: RawPlayerRecord) -> Result<Self, Self::Error> {
        let source_id = required(raw.source_id)
            .ok_or_else(|| LinkageError::malformed("<unknown>", "missing source id"))?;
        let name =
            required(raw.name).ok_or_else(|| LinkageError::malformed(&source_id, "missing name"))?;
        let position = required(raw.position)
            .ok_or_else(|| LinkageError::malformed(&source_id, "missing position"))?;
        let team = required(raw.team).unwrap_or_else(|| FREE_AGENT.to_string());

        Ok(Self { source_id, name, position: Position::from(position), team })
    }
}

/// Stable key for a player in the mapping store: normalized name plus position
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerKey(String);

impl PlayerKey {
    /// Build a key from an already-normalized name key and position
    pub fn new(name_key: &str, position: &Position) -> Self {
        Self(format!("{name_key}|{position}"))
    }

    /// Build a key from a display name, normalizing it first
    pub fn from_display(name: &str, position: &Position) -> Self {
        Self::new(&crate::normalize::normalize_name(name), position)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The normalized-name half of the key
    pub fn name_key(&self) -> &str {
        self.0.rsplit_once('|').map(|(name, _)| name).unwrap_or(&self.0)
    }
}

impl fmt::Display for PlayerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Canonical, comparison-ready view of a [`PlayerRecord`]
///
/// Created per matching pass and discarded afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRecord {
    pub source_id: String,

    /// Original display name, kept for reporting
    pub display_name: String,

    /// Lower-cased name with punctuation and suffixes stripped
    pub name_key: String,

    pub position: Position,

    /// Canonical team code, or "FA"
    pub team: String,
}

impl NormalizedRecord {
    /// Stable store key for this record
    pub fn key(&self) -> PlayerKey {
        PlayerKey::new(&self.name_key, &self.position)
    }

    /// Whether the record has a real team (not empty, not a free agent)
    pub fn has_team(&self) -> bool {
        !self.team.is_empty() && self.team != FREE_AGENT
    }

    /// Re-express this view as a provider record, for idempotence checks
    pub fn as_record(&self) -> PlayerRecord {
        PlayerRecord {
            source_id: self.source_id.clone(),
            name: self.name_key.clone(),
            position: self.position.clone(),
            team: self.team.clone(),
        }
    }
}

/// Confidence bucket for a match, ordered from weakest to strongest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceTier {
    Unmatched,
    Low,
    Medium,
    High,
    /// Exact curated identity match
    Verified,
}

impl ConfidenceTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfidenceTier::Unmatched => "unmatched",
            ConfidenceTier::Low => "low",
            ConfidenceTier::Medium => "medium",
            ConfidenceTier::High => "high",
            ConfidenceTier::Verified => "verified",
        }
    }

    pub fn is_match(&self) -> bool {
        *self != ConfidenceTier::Unmatched
    }
}

impl fmt::Display for ConfidenceTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A linkage decision between one primary record and one secondary record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    /// Store key of the primary record
    pub key: PlayerKey,

    /// Display name of the primary record
    pub player_name: String,

    pub source_a_id: String,
    pub source_b_id: String,

    /// Similarity score, clamped to [0, 1]
    pub score: f64,

    pub confidence_tier: ConfidenceTier,

    /// Position and team of the primary record
    pub position: Position,
    pub team: String,
}
