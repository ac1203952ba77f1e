//! End-to-end matching scenarios

use crate::config::MatcherConfig;
use crate::matcher::{CuratedIdentity, Matcher};
use crate::types::{ConfidenceTier, PlayerKey, PlayerRecord, Position};

fn sleeper_roster() -> Vec<PlayerRecord> {
    vec![
        PlayerRecord::new("4046", "Patrick Mahomes", "QB", "KC"),
        PlayerRecord::new("6794", "Justin Jefferson", "WR", "MIN"),
        PlayerRecord::new("7547", "Amon-Ra St. Brown", "WR", "DET"),
        PlayerRecord::new("5859", "T.J. Hockenson", "TE", "MIN"),
        PlayerRecord::new("9509", "Bijan Robinson", "RB", "ATL"),
        PlayerRecord::new("1166", "Kenneth Walker III", "RB", "SEA"),
        PlayerRecord::new("2000", "Zzyzx Unknown", "WR", "NYG"),
    ]
}

fn espn_roster() -> Vec<PlayerRecord> {
    vec![
        PlayerRecord::new("3139477", "Pat Mahomes", "QB", "KC"),
        PlayerRecord::new("4262921", "Justin Jefferson", "WR", "MIN"),
        PlayerRecord::new("4361548", "Amon-Ra St. Brown", "WR", "DET"),
        PlayerRecord::new("3918449", "TJ Hockenson", "TE", "MIN"),
        PlayerRecord::new("4431882", "Bijan Robinson", "RB", "ATL"),
        PlayerRecord::new("4567048", "Kenneth Walker", "RB", "SEA"),
    ]
}

#[test]
fn test_mahomes_nickname_matches_high() {
    let matcher = Matcher::new(MatcherConfig::default()).unwrap();
    let a = vec![PlayerRecord::new("A1", "Patrick Mahomes", "QB", "KC")];
    let b = vec![PlayerRecord::new("B1", "Pat Mahomes", "QB", "KC")];

    let outcome = matcher.run(&a, &b, &[]);
    assert_eq!(outcome.results.len(), 1);

    let result = &outcome.results[0];
    assert_eq!(result.source_b_id, "B1");
    assert!(result.confidence_tier >= ConfidenceTier::High);
    assert_eq!(result.score, 1.0);
}

#[test]
fn test_same_name_different_position_is_unmatched() {
    let matcher = Matcher::new(MatcherConfig::default()).unwrap();
    let a = vec![PlayerRecord::new("A1", "John Smith", "WR", "DAL")];
    let b = vec![PlayerRecord::new("B1", "John Smith", "K", "DAL")];

    let outcome = matcher.run(&a, &b, &[]);
    assert!(outcome.results.is_empty());
    assert_eq!(outcome.unmatched.len(), 1);
    assert_eq!(outcome.unmatched[0].source_id, "A1");
}

#[test]
fn test_curated_identity_wins_over_fuzzy_candidate() {
    let matcher = Matcher::new(MatcherConfig::default()).unwrap();
    let curated = vec![CuratedIdentity {
        key: PlayerKey::from_display("Justin Jefferson", &Position::WR),
        display_name: "Justin Jefferson".to_string(),
        secondary_id: "99".to_string(),
        position: Position::WR,
        aliases: Vec::new(),
    }];

    let outcome = matcher.run(&sleeper_roster(), &espn_roster(), &curated);
    let jefferson: Vec<_> =
        outcome.results.iter().filter(|r| r.player_name == "Justin Jefferson").collect();

    assert_eq!(jefferson.len(), 1);
    assert_eq!(jefferson[0].source_b_id, "99");
    assert_eq!(jefferson[0].confidence_tier, ConfidenceTier::Verified);
    assert_eq!(outcome.count_tier(ConfidenceTier::Verified), 1);
}

#[test]
fn test_full_roster_pass() {
    let matcher = Matcher::new(MatcherConfig::default()).unwrap();
    let outcome = matcher.run(&sleeper_roster(), &espn_roster(), &[]);

    assert_eq!(outcome.results.len(), 6);
    assert_eq!(outcome.unmatched.len(), 1);
    assert_eq!(outcome.unmatched[0].name, "Zzyzx Unknown");

    let walker = outcome.results.iter().find(|r| r.source_a_id == "1166").unwrap();
    assert_eq!(walker.source_b_id, "4567048");
    assert_eq!(walker.key.as_str(), "kenneth walker|RB");

    let hockenson = outcome.results.iter().find(|r| r.source_a_id == "5859").unwrap();
    assert_eq!(hockenson.source_b_id, "3918449");
    assert_eq!(hockenson.confidence_tier, ConfidenceTier::High);
}

#[test]
fn test_parallel_pass_is_deterministic() {
    let sequential = Matcher::new(MatcherConfig::default()).unwrap();
    let parallel =
        Matcher::new(MatcherConfig { parallel: true, ..MatcherConfig::default() }).unwrap();

    let mut a = sleeper_roster();
    let mut b = espn_roster();
    for i in 0..200 {
        a.push(PlayerRecord::new(format!("s{i}"), format!("Depth Player {i}"), "WR", "NYG"));
        b.push(PlayerRecord::new(format!("e{i}"), format!("Depth Player {i}"), "WR", "NYG"));
        b.push(PlayerRecord::new(format!("x{i}"), format!("Depth Player {i}"), "WR", "NYG"));
    }

    let expected = sequential.run(&a, &b, &[]);
    for _ in 0..3 {
        assert_eq!(parallel.run(&a, &b, &[]), expected);
    }

    // Duplicate candidates tie exactly; the first-seen one wins
    let depth = expected.results.iter().find(|r| r.source_a_id == "s7").unwrap();
    assert_eq!(depth.source_b_id, "e7");
}
