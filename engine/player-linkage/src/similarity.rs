use crate::config::{ScorerConfig, SimilarityMetric};
use crate::types::{ConfidenceTier, NormalizedRecord};

/// Scores how likely two normalized records are the same athlete
///
/// The score is the name similarity in [0, 1] plus a team bonus, so it can exceed
/// 1.0. It is only clamped when a tier is assigned.
#[derive(Debug, Clone, Default)]
pub struct SimilarityScorer {
    config: ScorerConfig,
}

impl SimilarityScorer {
    /// Create a new scorer
    pub fn new(config: ScorerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ScorerConfig {
        &self.config
    }

    /// Symmetric name similarity in [0, 1]; 1.0 only for identical keys
    pub fn name_similarity(&self, a: &str, b: &str) -> f64 {
        // Canonical argument order keeps every metric symmetric
        let (a, b) = if a <= b { (a, b) } else { (b, a) };
        match self.config.metric {
            SimilarityMetric::Gestalt => gestalt_ratio(a, b),
            SimilarityMetric::Levenshtein => strsim::normalized_levenshtein(a, b),
            SimilarityMetric::JaroWinkler => {
                if a == b {
                    1.0
                } else {
                    strsim::jaro_winkler(a, b)
                }
            }
        }
    }

    /// Both records carry the same real team
    pub fn team_matches(&self, a: &NormalizedRecord, b: &NormalizedRecord) -> bool {
        a.has_team() && b.has_team() && a.team == b.team
    }

    /// Raw, unclamped score. Position is not a term here; the matcher filters on it.
    pub fn score(&self, a: &NormalizedRecord, b: &NormalizedRecord) -> f64 {
        let base = self.name_similarity(&a.name_key, &b.name_key);
        if self.team_matches(a, b) {
            base + self.config.team_bonus
        } else {
            base
        }
    }

    /// Clamp a raw score and assign its tier
    pub fn grade(&self, raw_score: f64) -> (f64, ConfidenceTier) {
        let score = clamp_score(raw_score);
        (score, self.config.thresholds.tier_for(score))
    }
}

/// Clamp a score into the reportable range [0, 1]
pub fn clamp_score(score: f64) -> f64 {
    score.clamp(0.0, 1.0)
}

/// Ratcliff/Obershelp similarity: twice the matched characters over the total length
pub fn gestalt_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    2.0 * matching_characters(&a, &b) as f64 / total as f64
}

/// Characters covered by the recursive longest-common-block decomposition
fn matching_characters(a: &[char], b: &[char]) -> usize {
    let (i, j, k) = longest_common_block(a, b);
    if k == 0 {
        return 0;
    }
    k + matching_characters(&a[..i], &b[..j]) + matching_characters(&a[i + k..], &b[j + k..])
}

/// Longest common contiguous block as (start in a, start in b, length).
/// Earliest block in `a` wins ties, then earliest in `b`.
fn longest_common_block(a: &[char], b: &[char]) -> (usize, usize, usize) {
    let mut best = (0, 0, 0);
    let mut prev = vec![0usize; b.len() + 1];
    for i in 0..a.len() {
        let mut curr = vec![0usize; b.len() + 1];
        for j in 0..b.len() {
            if a[i] == b[j] {
                let len = prev[j] + 1;
                curr[j + 1] = len;
                if len > best.2 {
                    best = (i + 1 - len, j + 1 - len, len);
                }
            }
        }
        prev = curr;
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::normalize;
    use crate::types::PlayerRecord;
    use proptest::prelude::*;

    fn record(name: &str, position: &str, team: &str) -> NormalizedRecord {
        normalize(&PlayerRecord::new("x", name, position, team))
    }

    #[test]
    fn test_gestalt_ratio() {
        assert_eq!(gestalt_ratio("", ""), 1.0);
        assert_eq!(gestalt_ratio("abc", "abc"), 1.0);
        assert_eq!(gestalt_ratio("abc", "xyz"), 0.0);
        // " mahomes" + "pat" = 11 matched chars over 26
        let ratio = gestalt_ratio("pat mahomes", "patrick mahomes");
        assert!((ratio - 22.0 / 26.0).abs() < 1e-9);
    }

    #[test]
    fn test_team_bonus_applied() {
        let scorer = SimilarityScorer::default();
        let a = record("Patrick Mahomes", "QB", "KC");
        let b = record("Pat Mahomes", "QB", "KC");
        let score = scorer.score(&a, &b);
        assert!(score > 1.0, "team bonus should push the raw score past 1.0: {score}");

        let (clamped, tier) = scorer.grade(score);
        assert_eq!(clamped, 1.0);
        assert_eq!(tier, ConfidenceTier::High);
    }

    #[test]
    fn test_no_bonus_for_free_agents() {
        let scorer = SimilarityScorer::default();
        let a = record("Ezekiel Elliott", "RB", "FA");
        let b = record("Ezekiel Elliott", "RB", "");
        assert_eq!(scorer.score(&a, &b), 1.0);
    }

    #[test]
    fn test_team_alias_counts_as_same_team() {
        let scorer = SimilarityScorer::default();
        let a = record("Trevor Lawrence", "QB", "JAC");
        let b = record("Trevor Lawrence", "QB", "JAX");
        assert!(scorer.team_matches(&a, &b));
    }

    #[test]
    fn test_exact_only_scores_one() {
        for metric in
            [SimilarityMetric::Gestalt, SimilarityMetric::Levenshtein, SimilarityMetric::JaroWinkler]
        {
            let scorer = SimilarityScorer::new(ScorerConfig { metric, ..Default::default() });
            assert_eq!(scorer.name_similarity("josh allen", "josh allen"), 1.0);
            assert!(scorer.name_similarity("josh allen", "josh allen ") < 1.0);
        }
    }

    proptest! {
        #[test]
        fn prop_name_similarity_is_symmetric(a in "[a-z ]{0,16}", b in "[a-z ]{0,16}") {
            for metric in [SimilarityMetric::Gestalt, SimilarityMetric::Levenshtein, SimilarityMetric::JaroWinkler] {
                let scorer = SimilarityScorer::new(ScorerConfig { metric, ..Default::default() });
                let ab = scorer.name_similarity(&a, &b);
                let ba = scorer.name_similarity(&b, &a);
                prop_assert_eq!(ab, ba);
                prop_assert!((0.0..=1.0).contains(&ab));
            }
        }

        #[test]
        fn prop_gestalt_is_one_only_for_equal(a in "[a-c]{0,6}", b in "[a-c]{0,6}") {
            let ratio = gestalt_ratio(&a, &b);
            prop_assert_eq!(ratio == 1.0, a == b);
        }
    }
}
