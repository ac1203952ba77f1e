//! On-disk formats and storage backends
//!
//! The curated document is only ever read. The cache document is read at start
//! and rewritten after a merge.

use crate::config::StoreConfig;
use crate::error::{Result, StoreError};
use crate::types::MergeMode;
use chrono::{DateTime, Utc};
use player_linkage::{ConfidenceTier, Position};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Current document format version
pub const DOCUMENT_VERSION: &str = "1.0";

fn default_version() -> String {
    DOCUMENT_VERSION.to_string()
}

/// Providers disagree on whether IDs are strings or numbers
fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Number(u64),
    }

    Ok(match Id::deserialize(deserializer)? {
        Id::Text(text) => text,
        Id::Number(number) => number.to_string(),
    })
}

fn optional_string_or_number<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    struct Wrapper(#[serde(deserialize_with = "string_or_number")] String);

    Ok(Option::<Wrapper>::deserialize(deserializer)?.map(|Wrapper(id)| id))
}

/// Manually curated mappings, keyed by player display name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CuratedDocument {
    #[serde(default = "default_version")]
    pub version: String,

    #[serde(default)]
    pub mappings: BTreeMap<String, CuratedRecord>,

    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl Default for CuratedDocument {
    fn default() -> Self {
        Self { version: default_version(), mappings: BTreeMap::new(), metadata: serde_json::Value::Null }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CuratedRecord {
    #[serde(alias = "espn_id", deserialize_with = "string_or_number")]
    pub secondary_id: String,

    pub position: Position,

    #[serde(default)]
    pub team: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
}

/// Automation-owned mappings, keyed by player key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheDocument {
    #[serde(default = "default_version")]
    pub version: String,

    #[serde(default)]
    pub last_refreshed: Option<DateTime<Utc>>,

    #[serde(default)]
    pub mappings: BTreeMap<String, CacheRecord>,

    #[serde(default)]
    pub metadata: CacheMetadata,
}

impl Default for CacheDocument {
    fn default() -> Self {
        Self {
            version: default_version(),
            last_refreshed: None,
            mappings: BTreeMap::new(),
            metadata: CacheMetadata::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheRecord {
    pub player_name: String,

    #[serde(default, alias = "sleeper_id", deserialize_with = "optional_string_or_number")]
    pub primary_id: Option<String>,

    #[serde(alias = "espn_id", deserialize_with = "string_or_number")]
    pub secondary_id: String,

    pub position: Position,

    #[serde(default)]
    pub team: String,

    pub confidence: ConfidenceTier,

    #[serde(default)]
    pub match_score: f64,

    #[serde(default)]
    pub last_updated: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheMetadata {
    #[serde(default)]
    pub total_matched: usize,

    #[serde(default)]
    pub total_unmatched: usize,

    #[serde(default)]
    pub refresh_type: Option<MergeMode>,
}

/// Abstract trait for mapping storage backends
#[async_trait::async_trait]
pub trait StoreBackend: Send + Sync {
    /// Load the curated layer
    async fn load_curated(&self) -> Result<CuratedDocument>;

    /// Load the cache layer
    async fn load_cache(&self) -> Result<CacheDocument>;

    /// Replace the persisted cache layer
    async fn save_cache(&self, cache: &CacheDocument) -> Result<()>;

    /// Human-readable location, for logs
    fn describe(&self) -> String;
}

/// JSON file backend: one file per layer
#[derive(Debug, Clone)]
pub struct JsonFileBackend {
    curated_path: PathBuf,
    cache_path: PathBuf,
}

impl JsonFileBackend {
    /// Create a new JSON file backend
    pub fn new(curated_path: impl Into<PathBuf>, cache_path: impl Into<PathBuf>) -> Self {
        Self { curated_path: curated_path.into(), cache_path: cache_path.into() }
    }

    /// Create a backend from store configuration
    pub fn from_config(config: &StoreConfig) -> Self {
        Self::new(config.curated_path(), config.cache_path())
    }

    pub fn curated_path(&self) -> &Path {
        &self.curated_path
    }

    pub fn cache_path(&self) -> &Path {
        &self.cache_path
    }

    /// Read and parse a document; a missing file is an empty document
    async fn read_document<T>(path: &Path) -> Result<T>
    where
        T: for<'de> Deserialize<'de> + Default,
    {
        let content = match tokio::fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("No mapping file at {:?}, starting empty", path);
                return Ok(T::default());
            }
            Err(e) => return Err(StoreError::Io(e)),
        };

        serde_json::from_str(&content).map_err(|e| StoreError::corrupt(path, e.to_string()))
    }
}

#[async_trait::async_trait]
impl StoreBackend for JsonFileBackend {
    async fn load_curated(&self) -> Result<CuratedDocument> {
        let document: CuratedDocument = Self::read_document(&self.curated_path).await?;
        debug!("Loaded {} curated mappings from {:?}", document.mappings.len(), self.curated_path);
        Ok(document)
    }

    async fn load_cache(&self) -> Result<CacheDocument> {
        let document: CacheDocument = Self::read_document(&self.cache_path).await?;
        debug!("Loaded {} cached mappings from {:?}", document.mappings.len(), self.cache_path);
        Ok(document)
    }

    async fn save_cache(&self, cache: &CacheDocument) -> Result<()> {
        if let Some(parent) = self.cache_path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let json = serde_json::to_string_pretty(cache)?;

        // Write then rename so a crash never leaves a half-written cache
        let mut tmp_path = self.cache_path.clone().into_os_string();
        tmp_path.push(".tmp");
        let tmp_path = PathBuf::from(tmp_path);

        tokio::fs::write(&tmp_path, json).await?;
        tokio::fs::rename(&tmp_path, &self.cache_path).await?;

        info!("Saved {} cached mappings to {:?}", cache.mappings.len(), self.cache_path);
        Ok(())
    }

    fn describe(&self) -> String {
        format!("curated={:?} cache={:?}", self.curated_path, self.cache_path)
    }
}

/// In-memory backend for tests and dry runs
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    curated: CuratedDocument,
    cache: Mutex<CacheDocument>,
    saves: AtomicUsize,
    corrupt: bool,
}

impl InMemoryBackend {
    pub fn new(curated: CuratedDocument, cache: CacheDocument) -> Self {
        Self { curated, cache: Mutex::new(cache), saves: AtomicUsize::new(0), corrupt: false }
    }

    /// A backend whose loads always fail as corrupt
    pub fn corrupt() -> Self {
        Self { corrupt: true, ..Self::default() }
    }

    /// Number of successful `save_cache` calls
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    /// Current cache document
    pub async fn cache_snapshot(&self) -> CacheDocument {
        self.cache.lock().await.clone()
    }
}

#[async_trait::async_trait]
impl StoreBackend for InMemoryBackend {
    async fn load_curated(&self) -> Result<CuratedDocument> {
        if self.corrupt {
            return Err(StoreError::corrupt("memory://curated", "simulated corruption"));
        }
        Ok(self.curated.clone())
    }

    async fn load_cache(&self) -> Result<CacheDocument> {
        if self.corrupt {
            return Err(StoreError::corrupt("memory://cache", "simulated corruption"));
        }
        Ok(self.cache.lock().await.clone())
    }

    async fn save_cache(&self, cache: &CacheDocument) -> Result<()> {
        *self.cache.lock().await = cache.clone();
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn describe(&self) -> String {
        "in-memory".to_string()
    }
}
