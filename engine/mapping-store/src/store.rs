use crate::error::{Result, StoreError};
use crate::persistence::{
    CacheDocument, CacheMetadata, CacheRecord, CuratedDocument, StoreBackend, DOCUMENT_VERSION,
};
use crate::report::{Conflict, MergeReport, Remap};
use crate::types::{MappingEntry, MergeMode, Origin};
use chrono::{DateTime, Utc};
use fuzzy_matcher::skim::SkimMatcherV2;
use fuzzy_matcher::FuzzyMatcher;
use player_linkage::{
    normalize_name, normalize_team, ConfidenceTier, CuratedIdentity, MatchOutcome, MatchResult,
    PlayerKey,
};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{debug, info, warn};

/// Player mapping store with a curated layer and a cache layer
///
/// The curated layer is authoritative and is never created, modified or
/// deleted by a merge. Only cache entries are written by automation.
#[derive(Debug, Clone, Default)]
pub struct MappingStore {
    curated: BTreeMap<PlayerKey, MappingEntry>,
    cache: BTreeMap<PlayerKey, MappingEntry>,
    one_to_one: bool,
    last_refreshed: Option<DateTime<Utc>>,
    metadata: CacheMetadata,
}

impl MappingStore {
    /// Build a store from curated and cache entries
    ///
    /// Origins are forced to match the layer each entry is placed in. The first
    /// entry wins when two share a key.
    pub fn new(
        curated: impl IntoIterator<Item = MappingEntry>,
        cache: impl IntoIterator<Item = MappingEntry>,
    ) -> Self {
        let mut store = Self::default();
        for mut entry in curated {
            entry.origin = Origin::Curated;
            entry.confidence_tier = ConfidenceTier::Verified;
            entry.last_updated = None;
            insert_first(&mut store.curated, entry, "curated");
        }
        for mut entry in cache {
            entry.origin = Origin::Cache;
            insert_first(&mut store.cache, entry, "cache");
        }
        store
    }

    /// Enforce one secondary ID per player on merge
    pub fn with_one_to_one(mut self, one_to_one: bool) -> Self {
        self.one_to_one = one_to_one;
        self
    }

    /// Build a store from persisted documents
    pub fn from_documents(curated: CuratedDocument, cache: CacheDocument) -> Self {
        let curated_entries = curated.mappings.into_iter().map(|(name, record)| MappingEntry {
            key: PlayerKey::from_display(&name, &record.position),
            player_name: name,
            primary_id: None,
            secondary_id: record.secondary_id,
            position: record.position,
            team: normalize_team(&record.team),
            confidence_tier: ConfidenceTier::Verified,
            origin: Origin::Curated,
            match_score: 1.0,
            aliases: record.aliases,
            last_updated: None,
        });

        // Cache keys are re-derived so files keyed by display name still load
        let cache_entries = cache.mappings.into_values().map(|record| MappingEntry {
            key: PlayerKey::from_display(&record.player_name, &record.position),
            player_name: record.player_name,
            primary_id: record.primary_id,
            secondary_id: record.secondary_id,
            position: record.position,
            team: normalize_team(&record.team),
            confidence_tier: record.confidence,
            origin: Origin::Cache,
            match_score: record.match_score,
            aliases: Vec::new(),
            last_updated: record.last_updated,
        });

        let mut store = Self::new(curated_entries, cache_entries);
        store.last_refreshed = cache.last_refreshed;
        store.metadata = cache.metadata;
        store
    }

    /// Load both layers from a backend. Fails on any unreadable layer.
    pub async fn load(backend: &dyn StoreBackend) -> Result<Self> {
        let curated = backend.load_curated().await?;
        let cache = backend.load_cache().await?;
        let store = Self::from_documents(curated, cache);
        info!(
            "Loaded mapping store from {}: {} curated, {} cached",
            backend.describe(),
            store.curated.len(),
            store.cache.len()
        );
        Ok(store)
    }

    /// Persist the cache layer. The curated layer is never written.
    pub async fn save(&self, backend: &dyn StoreBackend) -> Result<()> {
        backend.save_cache(&self.to_cache_document()).await
    }

    /// Serializable form of the cache layer
    pub fn to_cache_document(&self) -> CacheDocument {
        let mappings = self
            .cache
            .iter()
            .map(|(key, entry)| {
                let record = CacheRecord {
                    player_name: entry.player_name.clone(),
                    primary_id: entry.primary_id.clone(),
                    secondary_id: entry.secondary_id.clone(),
                    position: entry.position.clone(),
                    team: entry.team.clone(),
                    confidence: entry.confidence_tier,
                    match_score: entry.match_score,
                    last_updated: entry.last_updated,
                };
                (key.to_string(), record)
            })
            .collect();

        CacheDocument {
            version: DOCUMENT_VERSION.to_string(),
            last_refreshed: self.last_refreshed,
            mappings,
            metadata: self.metadata.clone(),
        }
    }

    pub fn curated(&self) -> &BTreeMap<PlayerKey, MappingEntry> {
        &self.curated
    }

    pub fn cache(&self) -> &BTreeMap<PlayerKey, MappingEntry> {
        &self.cache
    }

    pub fn last_refreshed(&self) -> Option<DateTime<Utc>> {
        self.last_refreshed
    }

    pub fn metadata(&self) -> &CacheMetadata {
        &self.metadata
    }

    pub fn len(&self) -> usize {
        self.export_refs().count()
    }

    pub fn is_empty(&self) -> bool {
        self.curated.is_empty() && self.cache.is_empty()
    }

    /// Curated identities for the matcher's priority pass
    pub fn curated_identities(&self) -> Vec<CuratedIdentity> {
        self.curated
            .values()
            .map(|entry| CuratedIdentity {
                key: entry.key.clone(),
                display_name: entry.player_name.clone(),
                secondary_id: entry.secondary_id.clone(),
                position: entry.position.clone(),
                aliases: entry.aliases.clone(),
            })
            .collect()
    }

    /// Look up a mapping, curated layer first
    pub fn lookup(&self, key: &PlayerKey) -> Result<&MappingEntry> {
        self.curated
            .get(key)
            .or_else(|| self.cache.get(key))
            .ok_or_else(|| StoreError::not_found(key.as_str()))
    }

    /// All mappings for a display name, at any position
    pub fn lookup_name(&self, name: &str) -> Vec<&MappingEntry> {
        let name_key = normalize_name(name);
        let curated = self.curated.values().filter(|e| e.key.name_key() == name_key);
        let cached = self
            .cache
            .values()
            .filter(|e| e.key.name_key() == name_key && !self.curated.contains_key(&e.key));
        curated.chain(cached).collect()
    }

    /// Snapshot of both layers; curated wins on a key collision
    pub fn export(&self) -> BTreeMap<PlayerKey, MappingEntry> {
        let mut snapshot = self.cache.clone();
        for (key, entry) in &self.curated {
            if let Some(shadowed) = snapshot.insert(key.clone(), entry.clone()) {
                warn!(
                    key = %key,
                    curated = %entry.secondary_id,
                    cache = %shadowed.secondary_id,
                    "Cache entry collides with curated entry; curated wins"
                );
            }
        }
        snapshot
    }

    /// Fuzzy search over display names, best first
    pub fn search(&self, query: &str, limit: usize) -> Vec<(i64, MappingEntry)> {
        let matcher = SkimMatcherV2::default().ignore_case();
        let mut hits: Vec<(i64, MappingEntry)> = self
            .export()
            .into_values()
            .filter_map(|entry| {
                let names = std::iter::once(&entry.player_name).chain(entry.aliases.iter());
                let score = names.filter_map(|name| matcher.fuzzy_match(name, query)).max()?;
                Some((score, entry))
            })
            .collect();

        hits.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.key.cmp(&b.1.key)));
        hits.truncate(limit);
        hits
    }

    /// Merge a full matching outcome, recording unmatched primary records
    pub fn merge_outcome(&mut self, outcome: &MatchOutcome, mode: MergeMode) -> MergeReport {
        let mut report = self.merge(&outcome.results, mode);
        report.unmatched = outcome.unmatched.len();
        self.metadata.total_unmatched = outcome.unmatched.len();
        report
    }

    /// Merge match results into the cache layer
    ///
    /// Incremental mode upserts into the existing cache and never downgrades an
    /// entry. Full mode rebuilds the cache from the results. In both modes results
    /// for curated keys are skipped and every change of secondary ID against the
    /// previous cache is reported.
    pub fn merge(&mut self, results: &[MatchResult], mode: MergeMode) -> MergeReport {
        let mut report = MergeReport::new(mode);
        let now = Utc::now();

        self.drop_curated_collisions(&mut report);

        let previous = match mode {
            MergeMode::Full => std::mem::take(&mut self.cache),
            MergeMode::Incremental => BTreeMap::new(),
        };

        let mut batch = self.prepare_batch(results, &mut report);
        if self.one_to_one {
            batch = self.enforce_one_to_one(batch, &mut report);
        }

        for result in batch {
            self.upsert(result, mode, &previous, now, &mut report);
        }

        if mode == MergeMode::Full {
            report.removed =
                previous.into_keys().filter(|key| !self.cache.contains_key(key)).collect();
        }

        report.shared_targets = self.count_shared_targets();
        if report.shared_targets > 0 {
            debug!("{} secondary IDs are mapped from more than one player", report.shared_targets);
        }

        self.last_refreshed = Some(now);
        self.metadata.total_matched = self.cache.len();
        self.metadata.refresh_type = Some(mode);

        info!(
            "Merged {} results ({} mode): {} added, {} upgraded, {} updated, {} remapped, {} skipped curated",
            results.len(),
            mode,
            report.added,
            report.upgraded,
            report.updated,
            report.remapped(),
            report.skipped_curated
        );

        report
    }

    /// Remove cache entries shadowed by curated entries
    fn drop_curated_collisions(&mut self, report: &mut MergeReport) {
        let colliding: Vec<PlayerKey> =
            self.cache.keys().filter(|key| self.curated.contains_key(*key)).cloned().collect();

        for key in colliding {
            let (Some(cached), Some(curated)) = (self.cache.remove(&key), self.curated.get(&key))
            else {
                continue;
            };
            if cached.secondary_id != curated.secondary_id {
                warn!(
                    key = %key,
                    curated = %curated.secondary_id,
                    cache = %cached.secondary_id,
                    "Dropping cache entry that conflicts with curated entry"
                );
            }
            report.conflicts.push(Conflict {
                key,
                curated_secondary_id: curated.secondary_id.clone(),
                cache_secondary_id: cached.secondary_id,
            });
        }
    }

    /// Count tiers, skip curated keys and keep one result per key
    fn prepare_batch<'r>(
        &self,
        results: &'r [MatchResult],
        report: &mut MergeReport,
    ) -> Vec<&'r MatchResult> {
        let mut batch: Vec<&MatchResult> = Vec::with_capacity(results.len());
        let mut slot_by_key: HashMap<&PlayerKey, usize> = HashMap::new();

        for result in results {
            if !result.confidence_tier.is_match() {
                continue;
            }
            report.record_tier(result.confidence_tier);

            if self.curated.contains_key(&result.key) {
                report.skipped_curated += 1;
                continue;
            }

            match slot_by_key.get(&result.key) {
                Some(&slot) => {
                    report.key_collisions += 1;
                    let kept = batch[slot];
                    warn!(
                        key = %result.key,
                        kept = %kept.source_a_id,
                        other = %result.source_a_id,
                        "Two primary records share one player key"
                    );
                    if outranks(result, kept) {
                        batch[slot] = result;
                    }
                }
                None => {
                    slot_by_key.insert(&result.key, batch.len());
                    batch.push(result);
                }
            }
        }

        batch
    }

    /// Keep the strongest claimant of each secondary ID; curated IDs are off limits
    fn enforce_one_to_one<'r>(
        &self,
        batch: Vec<&'r MatchResult>,
        report: &mut MergeReport,
    ) -> Vec<&'r MatchResult> {
        let curated_ids: HashSet<&str> =
            self.curated.values().map(|e| e.secondary_id.as_str()).collect();

        let mut winner: HashMap<&str, &MatchResult> = HashMap::new();
        for &result in &batch {
            if curated_ids.contains(result.source_b_id.as_str()) {
                continue;
            }
            let replace = winner
                .get(result.source_b_id.as_str())
                .map_or(true, |current| outranks(result, current));
            if replace {
                winner.insert(result.source_b_id.as_str(), result);
            }
        }

        let kept: Vec<&MatchResult> = batch
            .into_iter()
            .filter(|result| {
                let keep = winner
                    .get(result.source_b_id.as_str())
                    .is_some_and(|w| std::ptr::eq(*w, *result));
                if !keep {
                    debug!(
                        key = %result.key,
                        secondary = %result.source_b_id,
                        "Dropping result whose secondary ID is claimed elsewhere"
                    );
                    report.duplicate_targets_dropped += 1;
                }
                keep
            })
            .collect();

        kept
    }

    /// Write one result, comparing against the live cache (incremental) or the
    /// cache as it was before a full refresh
    fn upsert(
        &mut self,
        result: &MatchResult,
        mode: MergeMode,
        previous: &BTreeMap<PlayerKey, MappingEntry>,
        now: DateTime<Utc>,
        report: &mut MergeReport,
    ) {
        let incoming = MappingEntry {
            key: result.key.clone(),
            player_name: result.player_name.clone(),
            primary_id: Some(result.source_a_id.clone()),
            secondary_id: result.source_b_id.clone(),
            position: result.position.clone(),
            team: result.team.clone(),
            confidence_tier: result.confidence_tier,
            origin: Origin::Cache,
            match_score: result.score,
            aliases: Vec::new(),
            last_updated: Some(now),
        };

        let existing = match mode {
            MergeMode::Incremental => self.cache.get(&result.key).cloned(),
            MergeMode::Full => previous.get(&result.key).cloned(),
        };
        let Some(existing) = existing else {
            self.cache.insert(result.key.clone(), incoming);
            report.added += 1;
            report.added_keys.push(result.key.clone());
            return;
        };

        let remapped = existing.secondary_id != incoming.secondary_id;
        if mode == MergeMode::Incremental && incoming.confidence_tier < existing.confidence_tier {
            if remapped {
                warn!(
                    key = %result.key,
                    kept = %existing.secondary_id,
                    offered = %incoming.secondary_id,
                    "Refusing lower-confidence remap"
                );
            }
            report.downgrades_refused += 1;
            return;
        }

        if incoming.confidence_tier == existing.confidence_tier
            && !remapped
            && same_details(&existing, &incoming)
        {
            report.unchanged += 1;
            self.cache.insert(result.key.clone(), existing);
            return;
        }

        if incoming.confidence_tier > existing.confidence_tier {
            report.upgraded += 1;
        } else if !remapped {
            debug!(
                player = %incoming.player_name,
                team = %incoming.team,
                tier = %incoming.confidence_tier,
                "Mapping details updated"
            );
            report.updated += 1;
        }
        if remapped {
            warn!(
                player = %incoming.player_name,
                old = %existing.secondary_id,
                new = %incoming.secondary_id,
                "Secondary ID remapped"
            );
            report.remaps.push(Remap {
                key: result.key.clone(),
                player_name: incoming.player_name.clone(),
                old_secondary_id: existing.secondary_id.clone(),
                new_secondary_id: incoming.secondary_id.clone(),
                old_tier: existing.confidence_tier,
                new_tier: incoming.confidence_tier,
            });
        }
        self.cache.insert(result.key.clone(), incoming);
    }

    fn count_shared_targets(&self) -> usize {
        let mut claims: HashMap<&str, usize> = HashMap::new();
        for entry in self.export_refs() {
            *claims.entry(entry.secondary_id.as_str()).or_default() += 1;
        }
        claims.values().filter(|&&count| count > 1).count()
    }

    /// Borrowing view of `export`
    fn export_refs(&self) -> impl Iterator<Item = &MappingEntry> {
        self.curated
            .values()
            .chain(self.cache.values().filter(|e| !self.curated.contains_key(&e.key)))
    }
}

/// Whether two entries for one key carry the same match data
fn same_details(a: &MappingEntry, b: &MappingEntry) -> bool {
    a.player_name == b.player_name
        && a.primary_id == b.primary_id
        && a.position == b.position
        && a.team == b.team
        && a.match_score == b.match_score
}

/// Stronger tier wins, then higher score; the earlier result keeps ties
fn outranks(candidate: &MatchResult, current: &MatchResult) -> bool {
    candidate.confidence_tier > current.confidence_tier
        || (candidate.confidence_tier == current.confidence_tier && candidate.score > current.score)
}

fn insert_first(layer: &mut BTreeMap<PlayerKey, MappingEntry>, entry: MappingEntry, name: &str) {
    if let Some(existing) = layer.get(&entry.key) {
        warn!(
            key = %entry.key,
            kept = %existing.player_name,
            ignored = %entry.player_name,
            "Duplicate {} key; keeping first entry",
            name
        );
        return;
    }
    layer.insert(entry.key.clone(), entry);
}
