//! Reconciliation driver: load, fetch, match, merge, save

use crate::config::{RefreshConfig, RetryConfig};
use crate::sources::{build_source, fetch_with_retry, validate_records, RosterSource};
use anyhow::{Context, Result};
use mapping_store::{
    JsonFileBackend, MappingEntry, MappingStore, MergeMode, MergeReport, StoreBackend,
};
use player_linkage::{MatchOutcome, Matcher};
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::info;

/// Number of sample rows printed per summary section
const SAMPLE_SIZE: usize = 5;

/// Options for a single refresh run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshOptions {
    pub mode: MergeMode,

    /// Match and report without saving the cache
    pub dry_run: bool,
}

impl Default for RefreshOptions {
    fn default() -> Self {
        Self { mode: MergeMode::Incremental, dry_run: false }
    }
}

/// What a refresh run did
#[derive(Debug, Clone)]
pub struct RefreshSummary {
    pub report: MergeReport,
    pub outcome: MatchOutcome,
    pub primary_records: usize,
    pub secondary_records: usize,
    pub malformed_primary: usize,
    pub malformed_secondary: usize,
    pub saved: bool,
    pub store_location: String,
}

/// Drives one reconciliation between the two providers
pub struct Reconciler {
    matcher: Matcher,
    backend: Arc<dyn StoreBackend>,
    primary: Arc<dyn RosterSource>,
    secondary: Arc<dyn RosterSource>,
    retry: RetryConfig,
    one_to_one: bool,
}

impl Reconciler {
    pub fn new(
        matcher: Matcher,
        backend: Arc<dyn StoreBackend>,
        primary: Arc<dyn RosterSource>,
        secondary: Arc<dyn RosterSource>,
        retry: RetryConfig,
    ) -> Self {
        Self { matcher, backend, primary, secondary, retry, one_to_one: false }
    }

    pub fn with_one_to_one(mut self, one_to_one: bool) -> Self {
        self.one_to_one = one_to_one;
        self
    }

    /// Build a reconciler with JSON file storage and the configured sources
    pub fn from_config(config: &RefreshConfig) -> Result<Self> {
        let matcher = Matcher::new(config.matcher.clone()).context("Failed to create matcher")?;
        let backend = Arc::new(JsonFileBackend::from_config(&config.store));
        let primary = build_source(&config.primary).context("Failed to create primary source")?;
        let secondary =
            build_source(&config.secondary).context("Failed to create secondary source")?;

        Ok(Self::new(matcher, backend, primary, secondary, config.retry.clone())
            .with_one_to_one(config.store.one_to_one))
    }

    async fn load_store(&self) -> Result<MappingStore> {
        let store = MappingStore::load(self.backend.as_ref())
            .await
            .with_context(|| format!("Failed to load mapping store ({})", self.backend.describe()))?;
        Ok(store.with_one_to_one(self.one_to_one))
    }

    /// Run a refresh. A store that cannot be read is never written.
    pub async fn run(&self, options: RefreshOptions) -> Result<RefreshSummary> {
        let mut store = self.load_store().await?;

        let (primary_raw, secondary_raw) = tokio::try_join!(
            fetch_with_retry(self.primary.as_ref(), &self.retry),
            fetch_with_retry(self.secondary.as_ref(), &self.retry),
        )?;

        let (primary, malformed_primary) = validate_records(primary_raw, &self.primary.name());
        let (secondary, malformed_secondary) =
            validate_records(secondary_raw, &self.secondary.name());
        info!(
            "Validated rosters: {} primary ({} skipped), {} secondary ({} skipped)",
            primary.len(),
            malformed_primary,
            secondary.len(),
            malformed_secondary
        );

        let outcome = self.matcher.run(&primary, &secondary, &store.curated_identities());
        let report = store.merge_outcome(&outcome, options.mode);

        let saved = if options.dry_run {
            info!("Dry run: cache not saved");
            false
        } else {
            store.save(self.backend.as_ref()).await.context("Failed to save mapping cache")?;
            true
        };

        Ok(RefreshSummary {
            report,
            outcome,
            primary_records: primary.len(),
            secondary_records: secondary.len(),
            malformed_primary,
            malformed_secondary,
            saved,
            store_location: self.backend.describe(),
        })
    }

    /// Fuzzy search of the persisted mappings
    pub async fn lookup(&self, query: &str, limit: usize) -> Result<Vec<(i64, MappingEntry)>> {
        let store = self.load_store().await?;
        Ok(store.search(query, limit))
    }
}

/// Render a refresh summary for the terminal
pub fn render_summary(summary: &RefreshSummary) -> String {
    let report = &summary.report;
    let mut out = String::new();

    let _ = writeln!(out, "\n📈 REFRESH RESULTS ({} mode)", report.mode);
    let _ = writeln!(out, "{}", "=".repeat(40));
    let _ = writeln!(
        out,
        "📋 Rosters: {} primary, {} secondary ({} / {} malformed skipped)",
        summary.primary_records,
        summary.secondary_records,
        summary.malformed_primary,
        summary.malformed_secondary
    );
    let _ = writeln!(
        out,
        "🎯 Matched: {} (verified {}, high {}, medium {}, low {})",
        report.matched(),
        report.verified,
        report.high,
        report.medium,
        report.low
    );
    let _ = writeln!(out, "✅ Added: {}", report.added);
    let _ = writeln!(out, "⬆️  Upgraded: {}", report.upgraded);
    let _ = writeln!(out, "✏️  Updated: {}", report.updated);
    let _ = writeln!(out, "🔄 Remapped: {}", report.remapped());
    let _ = writeln!(out, "➖ Unchanged: {}", report.unchanged);
    let _ = writeln!(out, "🛡️  Downgrades refused: {}", report.downgrades_refused);
    let _ = writeln!(out, "🔒 Skipped (curated): {}", report.skipped_curated);
    let _ = writeln!(out, "❌ Removed: {}", report.removed.len());
    let _ = writeln!(out, "❓ Unmatched: {}", report.unmatched);

    if report.key_collisions > 0 || report.shared_targets > 0 || report.duplicate_targets_dropped > 0
    {
        let _ = writeln!(
            out,
            "⚠️  Key collisions: {}, shared secondary IDs: {}, dropped duplicates: {}",
            report.key_collisions, report.shared_targets, report.duplicate_targets_dropped
        );
    }

    if !report.conflicts.is_empty() {
        let _ = writeln!(out, "\n⚠️  Cache entries dropped in favour of curated:");
        for conflict in report.conflicts.iter().take(SAMPLE_SIZE) {
            let _ = writeln!(
                out,
                "   {} (curated {}, cache {})",
                conflict.key, conflict.curated_secondary_id, conflict.cache_secondary_id
            );
        }
    }

    if !report.added_keys.is_empty() {
        let _ = writeln!(out, "\n🎯 Newly Matched Players (sample):");
        let added = report
            .added_keys
            .iter()
            .filter_map(|key| summary.outcome.results.iter().find(|r| &r.key == key));
        for result in added.take(SAMPLE_SIZE) {
            let _ = writeln!(
                out,
                "   {} ({} - {}) - Confidence: {}",
                result.player_name, result.position, result.team, result.confidence_tier
            );
        }
    }

    if !report.remaps.is_empty() {
        let _ = writeln!(out, "\n🔄 Remapped Players (sample):");
        for remap in report.remaps.iter().take(SAMPLE_SIZE) {
            let _ = writeln!(
                out,
                "   {}: {} -> {} ({} -> {})",
                remap.player_name,
                remap.old_secondary_id,
                remap.new_secondary_id,
                remap.old_tier,
                remap.new_tier
            );
        }
    }

    if !summary.outcome.unmatched.is_empty() {
        let _ = writeln!(out, "\n⚠️  Unmatched Players (sample):");
        for player in summary.outcome.unmatched.iter().take(SAMPLE_SIZE) {
            let _ = write!(out, "   {} ({} - {})", player.name, player.position, player.team);
            if let (Some(score), Some(candidate)) = (player.best_score, &player.best_candidate) {
                let _ = write!(out, " closest: {} ({:.2})", candidate, score);
            }
            let _ = writeln!(out);
        }
    }

    if summary.saved {
        let _ = writeln!(out, "\n💾 Cache updated: {}", summary.store_location);
    } else {
        let _ = writeln!(out, "\n🧪 Dry run: cache not written");
    }

    out
}

/// Render lookup hits for the terminal
pub fn render_lookup(query: &str, hits: &[(i64, MappingEntry)]) -> String {
    let mut out = String::new();
    if hits.is_empty() {
        let _ = writeln!(out, "No mappings match '{}'", query);
        return out;
    }

    for (_, entry) in hits {
        let _ = writeln!(
            out,
            "{} ({} - {}) -> {} [{} {}, score {:.2}]",
            entry.player_name,
            entry.position,
            entry.team,
            entry.secondary_id,
            entry.origin,
            entry.confidence_tier,
            entry.match_score
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use mapping_store::{CacheDocument, CuratedDocument, CuratedRecord, InMemoryBackend};
    use player_linkage::{MatcherConfig, Position, RawPlayerRecord};
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Roster that fails a fixed number of times before answering
    struct StaticSource {
        players: Vec<RawPlayerRecord>,
        failures: AtomicU32,
    }

    impl StaticSource {
        fn new(players: &[(&str, Option<&str>, &str, &str)]) -> Self {
            let players = players
                .iter()
                .map(|(id, name, position, team)| RawPlayerRecord {
                    source_id: Some(id.to_string()),
                    name: name.map(str::to_string),
                    position: Some(position.to_string()),
                    team: Some(team.to_string()),
                })
                .collect();
            Self { players, failures: AtomicU32::new(0) }
        }

        fn failing(self, failures: u32) -> Self {
            self.failures.store(failures, Ordering::SeqCst);
            self
        }
    }

    #[async_trait::async_trait]
    impl RosterSource for StaticSource {
        async fn fetch(&self) -> Result<Vec<RawPlayerRecord>> {
            let remaining = self.failures.load(Ordering::SeqCst);
            if remaining > 0 {
                self.failures.store(remaining - 1, Ordering::SeqCst);
                anyhow::bail!("provider unavailable");
            }
            Ok(self.players.clone())
        }

        fn name(&self) -> String {
            "static".to_string()
        }
    }

    fn sleeper() -> StaticSource {
        StaticSource::new(&[
            ("6794", Some("Justin Jefferson"), "WR", "MIN"),
            ("4046", Some("Patrick Mahomes"), "QB", "KC"),
            ("9509", Some("Bijan Robinson"), "RB", "ATL"),
            ("2000", Some("Zzyzx Unknown"), "WR", "NYG"),
            ("3000", None, "WR", "NYG"),
        ])
    }

    fn espn() -> StaticSource {
        StaticSource::new(&[
            ("4262921", Some("Justin Jefferson"), "WR", "MIN"),
            ("3139477", Some("Pat Mahomes"), "QB", "KC"),
            ("4431882", Some("Bijan Robinson"), "RB", "ATL"),
        ])
    }

    fn curated() -> CuratedDocument {
        let mut document = CuratedDocument::default();
        document.mappings.insert(
            "Justin Jefferson".to_string(),
            CuratedRecord {
                secondary_id: "99".to_string(),
                position: Position::WR,
                team: "MIN".to_string(),
                aliases: Vec::new(),
            },
        );
        document
    }

    fn no_delay() -> RetryConfig {
        RetryConfig { max_retries: 3, initial_delay_secs: 0, max_delay_secs: 0, backoff_multiplier: 2.0 }
    }

    fn reconciler(backend: Arc<InMemoryBackend>, primary: StaticSource) -> Reconciler {
        Reconciler::new(
            Matcher::new(MatcherConfig::default()).unwrap(),
            backend,
            Arc::new(primary),
            Arc::new(espn()),
            no_delay(),
        )
    }

    #[tokio::test]
    async fn test_refresh_saves_cache() {
        let backend = Arc::new(InMemoryBackend::new(curated(), CacheDocument::default()));
        let summary = reconciler(backend.clone(), sleeper().failing(2))
            .run(RefreshOptions::default())
            .await
            .unwrap();

        assert!(summary.saved);
        assert_eq!(summary.malformed_primary, 1);
        assert_eq!(summary.report.skipped_curated, 1);
        assert_eq!(summary.report.added, 2);
        assert_eq!(summary.report.unmatched, 1);
        assert_eq!(backend.save_count(), 1);
        assert_eq!(backend.cache_snapshot().await.mappings.len(), 2);

        let rendered = render_summary(&summary);
        assert!(rendered.contains("Added: 2"));
        assert!(rendered.contains("Zzyzx Unknown"));
        assert!(rendered.contains("Newly Matched Players"));
        assert!(rendered.contains("Bijan Robinson (RB - ATL) - Confidence: high"));
        assert!(!rendered.contains("Justin Jefferson (WR"));
    }

    #[tokio::test]
    async fn test_dry_run_does_not_save() {
        let backend = Arc::new(InMemoryBackend::new(curated(), CacheDocument::default()));
        let options = RefreshOptions { mode: MergeMode::Full, dry_run: true };
        let summary = reconciler(backend.clone(), sleeper()).run(options).await.unwrap();

        assert!(!summary.saved);
        assert_eq!(summary.report.added, 2);
        assert_eq!(backend.save_count(), 0);
        assert!(render_summary(&summary).contains("Dry run"));
    }

    #[tokio::test]
    async fn test_corrupt_store_aborts_without_writing() {
        let backend = Arc::new(InMemoryBackend::corrupt());
        let result = reconciler(backend.clone(), sleeper()).run(RefreshOptions::default()).await;

        let err = result.unwrap_err();
        assert!(err.chain().any(|cause| cause.to_string().contains("corrupt")));
        assert_eq!(backend.save_count(), 0);
    }

    #[tokio::test]
    async fn test_unreachable_provider_fails_run() {
        let backend = Arc::new(InMemoryBackend::new(curated(), CacheDocument::default()));
        let result = reconciler(backend.clone(), sleeper().failing(10))
            .run(RefreshOptions::default())
            .await;

        assert!(result.is_err());
        assert_eq!(backend.save_count(), 0);
    }

    #[tokio::test]
    async fn test_second_incremental_run_is_noop() {
        let backend = Arc::new(InMemoryBackend::new(curated(), CacheDocument::default()));
        let first = reconciler(backend.clone(), sleeper()).run(RefreshOptions::default()).await.unwrap();
        assert!(!first.report.is_noop());

        let second =
            reconciler(backend.clone(), sleeper()).run(RefreshOptions::default()).await.unwrap();
        assert!(second.report.is_noop());
        assert_eq!(second.report.unchanged, 2);
    }

    #[tokio::test]
    async fn test_lookup_searches_persisted_store() {
        let backend = Arc::new(InMemoryBackend::new(curated(), CacheDocument::default()));
        let reconciler = reconciler(backend, sleeper());
        reconciler.run(RefreshOptions::default()).await.unwrap();

        let hits = reconciler.lookup("mahomes", 5).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].1.secondary_id, "3139477");

        let rendered = render_lookup("mahomes", &hits);
        assert!(rendered.contains("Patrick Mahomes"));
        assert!(render_lookup("nobody", &[]).contains("No mappings"));
    }
}
