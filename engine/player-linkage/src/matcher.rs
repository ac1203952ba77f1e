use crate::config::MatcherConfig;
use crate::error::Result;
use crate::normalize::{normalize_name, Normalizer};
use crate::similarity::SimilarityScorer;
use crate::types::{ConfidenceTier, MatchResult, NormalizedRecord, PlayerKey, PlayerRecord, Position};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{debug, info};

/// A curated (manually verified) identity the priority pass honours
#[derive(Debug, Clone, PartialEq)]
pub struct CuratedIdentity {
    /// Store key of the curated entry
    pub key: PlayerKey,

    pub display_name: String,

    pub secondary_id: String,

    pub position: Position,

    /// Additional display names that resolve to this identity
    pub aliases: Vec<String>,
}

/// A primary record that could not be linked
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnmatchedRecord {
    pub source_id: String,
    pub name: String,
    pub position: Position,
    pub team: String,

    /// Best score seen, if any candidate shared the position
    pub best_score: Option<f64>,

    /// Display name of that best candidate
    pub best_candidate: Option<String>,
}

/// Everything one matching pass produced
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchOutcome {
    /// Accepted matches, priority pass first, then fuzzy pass, each in primary order
    pub results: Vec<MatchResult>,

    /// Primary records left unmapped
    pub unmatched: Vec<UnmatchedRecord>,

    /// Primary records ignored by position or free-agent filters
    pub filtered: usize,
}

impl MatchOutcome {
    /// Number of results in a given tier
    pub fn count_tier(&self, tier: ConfidenceTier) -> usize {
        self.results.iter().filter(|r| r.confidence_tier == tier).count()
    }
}

/// Best fuzzy candidate for one primary record
struct Candidate {
    index: usize,
    score: f64,
    team_match: bool,
}

/// Two-phase matcher: curated priority pass, then position-filtered fuzzy pass
///
/// The fuzzy pass is a greedy one-sided assignment. A secondary record may be
/// the best match of several primary records; one-to-one validation belongs to
/// the mapping store.
#[derive(Debug, Clone)]
pub struct Matcher {
    config: MatcherConfig,
    normalizer: Normalizer,
    scorer: SimilarityScorer,
}

impl Matcher {
    /// Create a new matcher, validating the configuration
    pub fn new(config: MatcherConfig) -> Result<Self> {
        config.validate()?;
        let normalizer = Normalizer::with_team_aliases(&config.team_aliases);
        let scorer = SimilarityScorer::new(config.scorer.clone());
        Ok(Self { config, normalizer, scorer })
    }

    pub fn config(&self) -> &MatcherConfig {
        &self.config
    }

    pub fn scorer(&self) -> &SimilarityScorer {
        &self.scorer
    }

    pub fn normalizer(&self) -> &Normalizer {
        &self.normalizer
    }

    /// Link `provider_a` records to `provider_b` records
    pub fn run(
        &self,
        provider_a: &[PlayerRecord],
        provider_b: &[PlayerRecord],
        curated: &[CuratedIdentity],
    ) -> MatchOutcome {
        let mut outcome = MatchOutcome::default();

        let mut primary = Vec::with_capacity(provider_a.len());
        for record in provider_a {
            let normalized = self.normalizer.normalize(record);
            if !self.config.is_eligible(&normalized.position)
                || (self.config.skip_free_agents && !normalized.has_team())
            {
                outcome.filtered += 1;
                continue;
            }
            primary.push(normalized);
        }

        let secondary: Vec<NormalizedRecord> = provider_b
            .iter()
            .map(|record| self.normalizer.normalize(record))
            .filter(|record| self.config.is_eligible(&record.position))
            .collect();

        info!(
            "Matching {} primary records against {} secondary records ({} curated, {} filtered)",
            primary.len(),
            secondary.len(),
            curated.len(),
            outcome.filtered
        );

        // Phase 1: curated identities claim their records before any fuzzy scoring
        let curated_index = index_curated(curated);
        let mut claimed_secondary: HashSet<&str> = HashSet::new();
        let mut remaining = Vec::with_capacity(primary.len());

        for record in &primary {
            match self.curated_for(&curated_index, record) {
                Some(identity) => {
                    claimed_secondary.insert(identity.secondary_id.as_str());
                    outcome.results.push(MatchResult {
                        key: identity.key.clone(),
                        player_name: record.display_name.clone(),
                        source_a_id: record.source_id.clone(),
                        source_b_id: identity.secondary_id.clone(),
                        score: 1.0,
                        confidence_tier: ConfidenceTier::Verified,
                        position: record.position.clone(),
                        team: record.team.clone(),
                    });
                }
                None => remaining.push(record),
            }
        }

        let verified = outcome.results.len();
        info!("Priority pass verified {} curated players", verified);

        // Phase 2: fuzzy pass over what is left
        let mut by_position: BTreeMap<&Position, Vec<usize>> = BTreeMap::new();
        for (index, record) in secondary.iter().enumerate() {
            if !claimed_secondary.contains(record.source_id.as_str()) {
                by_position.entry(&record.position).or_default().push(index);
            }
        }

        let decide = |record: &&NormalizedRecord| self.best_candidate(record, &secondary, &by_position);
        let decisions: Vec<Option<Candidate>> = if self.config.parallel {
            remaining.par_iter().map(decide).collect()
        } else {
            remaining.iter().map(decide).collect()
        };

        for (record, decision) in remaining.into_iter().zip(decisions) {
            let graded = decision.map(|c| {
                let (score, tier) = self.scorer.grade(c.score);
                (c, score, tier)
            });

            match graded {
                Some((candidate, score, tier)) if tier.is_match() => {
                    let target = &secondary[candidate.index];
                    debug!(
                        player = %record.display_name,
                        candidate = %target.display_name,
                        score,
                        %tier,
                        "Fuzzy matched"
                    );
                    outcome.results.push(MatchResult {
                        key: record.key(),
                        player_name: record.display_name.clone(),
                        source_a_id: record.source_id.clone(),
                        source_b_id: target.source_id.clone(),
                        score,
                        confidence_tier: tier,
                        position: record.position.clone(),
                        team: record.team.clone(),
                    });
                }
                graded => {
                    let best = graded.map(|(candidate, score, _)| (candidate.index, score));
                    outcome.unmatched.push(UnmatchedRecord {
                        source_id: record.source_id.clone(),
                        name: record.display_name.clone(),
                        position: record.position.clone(),
                        team: record.team.clone(),
                        best_score: best.map(|(_, score)| score),
                        best_candidate: best.map(|(index, _)| secondary[index].display_name.clone()),
                    });
                }
            }
        }

        info!(
            "Fuzzy pass matched {} players, {} unmatched",
            outcome.results.len() - verified,
            outcome.unmatched.len()
        );

        outcome
    }

    /// Curated identity for a record: exact normalized name or alias, compatible position
    fn curated_for<'c>(
        &self,
        index: &HashMap<String, Vec<&'c CuratedIdentity>>,
        record: &NormalizedRecord,
    ) -> Option<&'c CuratedIdentity> {
        index.get(&record.name_key).and_then(|identities| {
            identities
                .iter()
                .find(|identity| self.config.positions_compatible(&identity.position, &record.position))
                .copied()
        })
    }

    /// Highest-scoring secondary record at a compatible position.
    /// Ties go to the team-matching candidate, then to the earliest secondary record.
    fn best_candidate(
        &self,
        record: &NormalizedRecord,
        secondary: &[NormalizedRecord],
        by_position: &BTreeMap<&Position, Vec<usize>>,
    ) -> Option<Candidate> {
        let mut candidates: Vec<usize> = by_position
            .iter()
            .filter(|(position, _)| self.config.positions_compatible(&record.position, position))
            .flat_map(|(_, indices)| indices.iter().copied())
            .collect();
        candidates.sort_unstable();

        let mut best: Option<Candidate> = None;
        for index in candidates {
            let target = &secondary[index];
            let score = self.scorer.score(record, target);
            let team_match = self.scorer.team_matches(record, target);

            let better = match &best {
                None => true,
                Some(current) => {
                    score > current.score
                        || (score == current.score && team_match && !current.team_match)
                }
            };
            if better {
                best = Some(Candidate { index, score, team_match });
            }
        }
        best
    }
}

/// Curated identities by normalized name, aliases included
fn index_curated(curated: &[CuratedIdentity]) -> HashMap<String, Vec<&CuratedIdentity>> {
    let mut index: HashMap<String, Vec<&CuratedIdentity>> = HashMap::new();
    for identity in curated {
        let mut names: Vec<String> = vec![identity.key.name_key().to_string()];
        names.extend(identity.aliases.iter().map(|alias| normalize_name(alias)));
        names.sort_unstable();
        names.dedup();
        for name in names {
            index.entry(name).or_default().push(identity);
        }
    }
    index
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScorerConfig;

    fn matcher() -> Matcher {
        Matcher::new(MatcherConfig::default()).unwrap()
    }

    fn curated(name: &str, position: Position, secondary_id: &str) -> CuratedIdentity {
        CuratedIdentity {
            key: PlayerKey::from_display(name, &position),
            display_name: name.to_string(),
            secondary_id: secondary_id.to_string(),
            position,
            aliases: Vec::new(),
        }
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = MatcherConfig {
            scorer: ScorerConfig { team_bonus: -1.0, ..Default::default() },
            ..Default::default()
        };
        assert!(Matcher::new(config).is_err());
    }

    #[test]
    fn test_team_match_then_first_seen() {
        let a = vec![PlayerRecord::new("A1", "Mike Williams", "WR", "NYJ")];
        let b = vec![
            PlayerRecord::new("B1", "Mike Williams", "WR", "LAC"),
            PlayerRecord::new("B2", "Mike Williams", "WR", "FA"),
        ];
        // Neither shares the team, so the first-seen record wins
        let outcome = matcher().run(&a, &b, &[]);
        assert_eq!(outcome.results[0].source_b_id, "B1");

        let b = vec![
            PlayerRecord::new("B1", "Mike Williams", "WR", "LAC"),
            PlayerRecord::new("B2", "Mike Williams", "WR", "NYJ"),
        ];
        let outcome = matcher().run(&a, &b, &[]);
        assert_eq!(outcome.results[0].source_b_id, "B2");
    }

    #[test]
    fn test_curated_alias_claims_record() {
        let mut identity = curated("Gabriel Davis", Position::WR, "4241474");
        identity.aliases.push("Gabe Davis".to_string());

        let a = vec![PlayerRecord::new("S1", "Gabe Davis", "WR", "JAX")];
        let b = vec![PlayerRecord::new("4241474", "Gabriel Davis", "WR", "JAX")];

        let outcome = matcher().run(&a, &b, &[identity]);
        assert_eq!(outcome.results.len(), 1);
        assert_eq!(outcome.results[0].confidence_tier, ConfidenceTier::Verified);
        assert_eq!(outcome.results[0].key.as_str(), "gabriel davis|WR");
    }

    #[test]
    fn test_curated_requires_compatible_position() {
        let identity = curated("John Smith", Position::WR, "77");
        let a = vec![PlayerRecord::new("S1", "John Smith", "K", "DAL")];
        let outcome = matcher().run(&a, &[], &[identity]);
        assert!(outcome.results.is_empty());
        assert_eq!(outcome.unmatched.len(), 1);
        assert_eq!(outcome.unmatched[0].best_score, None);
    }

    #[test]
    fn test_claimed_secondary_not_reused_by_fuzzy_pass() {
        let identity = curated("Justin Jefferson", Position::WR, "99");
        let a = vec![
            PlayerRecord::new("S1", "Justin Jefferson", "WR", "MIN"),
            PlayerRecord::new("S2", "Justin Jeffersen", "WR", "MIN"),
        ];
        let b = vec![PlayerRecord::new("99", "Justin Jefferson", "WR", "MIN")];

        let outcome = matcher().run(&a, &b, &[identity]);
        assert_eq!(outcome.results.len(), 1);
        assert_eq!(outcome.unmatched.len(), 1);
        assert_eq!(outcome.unmatched[0].source_id, "S2");
    }

    #[test]
    fn test_eligibility_and_free_agent_filters() {
        let config = MatcherConfig {
            eligible_positions: Some(vec![Position::QB, Position::RB, Position::WR, Position::TE]),
            skip_free_agents: true,
            ..Default::default()
        };
        let matcher = Matcher::new(config).unwrap();
        let a = vec![
            PlayerRecord::new("S1", "Justin Tucker", "K", "BAL"),
            PlayerRecord::new("S2", "Kareem Hunt", "RB", "FA"),
            PlayerRecord::new("S3", "Josh Allen", "QB", "BUF"),
        ];
        let b = vec![PlayerRecord::new("E3", "Josh Allen", "QB", "BUF")];

        let outcome = matcher.run(&a, &b, &[]);
        assert_eq!(outcome.filtered, 2);
        assert_eq!(outcome.results.len(), 1);
        assert_eq!(outcome.results[0].source_b_id, "E3");
    }

    #[test]
    fn test_equivalent_positions_are_candidates() {
        let a = vec![PlayerRecord::new("S1", "Kyle Juszczyk", "FB", "SF")];
        let b = vec![PlayerRecord::new("E1", "Kyle Juszczyk", "RB", "SF")];
        let outcome = matcher().run(&a, &b, &[]);
        assert_eq!(outcome.results.len(), 1);
        assert_eq!(outcome.results[0].confidence_tier, ConfidenceTier::High);
    }

    #[test]
    fn test_many_to_one_allowed() {
        let a = vec![
            PlayerRecord::new("S1", "Josh Allen", "QB", "BUF"),
            PlayerRecord::new("S2", "Josh Allan", "QB", "BUF"),
        ];
        let b = vec![PlayerRecord::new("E1", "Josh Allen", "QB", "BUF")];
        let outcome = matcher().run(&a, &b, &[]);
        assert_eq!(outcome.results.len(), 2);
        assert!(outcome.results.iter().all(|r| r.source_b_id == "E1"));
    }
}
