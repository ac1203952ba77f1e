//! Canonical forms for names, positions and team codes
//!
//! Every function here is total: garbage in gives a best-effort canonical form,
//! never an error.

use crate::types::{NormalizedRecord, PlayerRecord, Position, FREE_AGENT};
use std::collections::HashMap;

/// Generational suffixes dropped from the end of a name
const NAME_SUFFIXES: &[&str] = &["jr", "sr", "ii", "iii", "iv", "v"];

/// Historical relocations and provider-specific spellings, folded onto one code
const TEAM_ALIASES: &[(&str, &str)] = &[
    ("JAC", "JAX"),
    ("WSH", "WAS"),
    ("LA", "LAR"),
    ("STL", "LAR"),
    ("SD", "LAC"),
    ("OAK", "LV"),
    ("LVR", "LV"),
    ("GNB", "GB"),
    ("KAN", "KC"),
    ("NWE", "NE"),
    ("NOR", "NO"),
    ("SFO", "SF"),
    ("TAM", "TB"),
    ("ARZ", "ARI"),
    ("BLT", "BAL"),
    ("CLV", "CLE"),
    ("HST", "HOU"),
];

/// Normalize a display name into a comparison key
///
/// Lower-cases, drops periods, apostrophes and commas, turns hyphens into spaces,
/// strips trailing suffixes ("Jr.", "III") and collapses whitespace.
pub fn normalize_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|c| !matches!(c, '.' | '\'' | '\u{2019}' | ','))
        .map(|c| if c == '-' || c == '_' { ' ' } else { c })
        .collect::<String>()
        .to_lowercase();

    let mut tokens: Vec<&str> = cleaned.split_whitespace().collect();
    // A lone "V" is somebody's name, not a suffix
    while tokens.len() > 1 && tokens.last().is_some_and(|t| NAME_SUFFIXES.contains(t)) {
        tokens.pop();
    }

    tokens.join(" ")
}

/// Normalize a position code, folding provider aliases ("PK" -> K, "DEF" -> DST)
pub fn normalize_position(position: &str) -> Position {
    let code = position.trim().to_uppercase();
    match code.as_str() {
        "QB" => Position::QB,
        "RB" | "HB" => Position::RB,
        "FB" => Position::FB,
        "WR" => Position::WR,
        "TE" => Position::TE,
        "K" | "PK" => Position::K,
        "DST" | "DEF" | "D/ST" | "DS" => Position::DST,
        "DL" | "DE" | "DT" => Position::DL,
        "LB" | "ILB" | "OLB" => Position::LB,
        "DB" | "CB" | "S" | "SS" | "FS" => Position::DB,
        _ => Position::Other(code),
    }
}

/// Normalize a team abbreviation; unknown codes pass through upper-cased
pub fn normalize_team(team: &str) -> String {
    let code = team.trim().to_uppercase();
    match code.as_str() {
        "" | "FA" | "NONE" | "NULL" => FREE_AGENT.to_string(),
        other => TEAM_ALIASES
            .iter()
            .find(|(alias, _)| *alias == other)
            .map(|(_, canonical)| canonical.to_string())
            .unwrap_or(code),
    }
}

/// Normalize a full record with the built-in alias tables
pub fn normalize(record: &PlayerRecord) -> NormalizedRecord {
    Normalizer::default().normalize(record)
}

/// Record normalizer with optional extra team aliases
///
/// Extra aliases are applied after the built-in table and should map onto
/// canonical codes, otherwise normalization stops being idempotent.
#[derive(Debug, Clone, Default)]
pub struct Normalizer {
    team_aliases: HashMap<String, String>,
}

impl Normalizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a normalizer with additional team aliases (alias -> canonical)
    pub fn with_team_aliases<I, A, C>(aliases: I) -> Self
    where
        I: IntoIterator<Item = (A, C)>,
        A: AsRef<str>,
        C: AsRef<str>,
    {
        let team_aliases = aliases
            .into_iter()
            .map(|(alias, canonical)| {
                (alias.as_ref().trim().to_uppercase(), canonical.as_ref().trim().to_uppercase())
            })
            .collect();
        Self { team_aliases }
    }

    pub fn team(&self, team: &str) -> String {
        let code = normalize_team(team);
        match self.team_aliases.get(&code) {
            Some(canonical) => canonical.clone(),
            None => code,
        }
    }

    pub fn normalize(&self, record: &PlayerRecord) -> NormalizedRecord {
        NormalizedRecord {
            source_id: record.source_id.clone(),
            display_name: record.name.clone(),
            name_key: normalize_name(&record.name),
            position: normalize_position(record.position.as_str()),
            team: self.team(&record.team),
        }
    }
}
