//! Provider roster sources

use crate::config::{RetryConfig, SourceConfig};
use anyhow::{Context, Result};
use player_linkage::{PlayerRecord, RawPlayerRecord};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

/// A provider roster that can be fetched as a whole
#[async_trait::async_trait]
pub trait RosterSource: Send + Sync {
    /// Fetch every player the provider knows about
    async fn fetch(&self) -> Result<Vec<RawPlayerRecord>>;

    /// Human-readable name, for logs
    fn name(&self) -> String;
}

/// Build the source described by configuration
pub fn build_source(config: &SourceConfig) -> Result<Arc<dyn RosterSource>> {
    let source: Arc<dyn RosterSource> = match config {
        SourceConfig::Sleeper { base_url, timeout_secs } => {
            Arc::new(SleeperSource::new(base_url, Duration::from_secs(*timeout_secs))?)
        }
        SourceConfig::File { path } => Arc::new(JsonRosterSource::new(path.clone())),
    };
    Ok(source)
}

/// Sleeper player as returned by `/players/nfl`
#[derive(Debug, Deserialize)]
struct SleeperPlayer {
    player_id: Option<String>,
    full_name: Option<String>,
    first_name: Option<String>,
    last_name: Option<String>,
    position: Option<String>,
    team: Option<String>,
}

impl SleeperPlayer {
    fn into_raw(self, id: String) -> RawPlayerRecord {
        let name = self.full_name.filter(|n| !n.trim().is_empty()).or_else(|| {
            match (self.first_name.as_deref(), self.last_name.as_deref()) {
                (Some(first), Some(last)) => Some(format!("{} {}", first.trim(), last.trim())),
                (Some(only), None) | (None, Some(only)) => Some(only.trim().to_string()),
                (None, None) => None,
            }
        });

        RawPlayerRecord {
            source_id: Some(self.player_id.unwrap_or(id)),
            name,
            position: self.position,
            team: self.team,
        }
    }
}

/// Sleeper API client for the full NFL player database
#[derive(Debug)]
pub struct SleeperSource {
    base_url: String,
    client: reqwest::Client,
}

impl SleeperSource {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self { base_url: base_url.trim_end_matches('/').to_string(), client })
    }

    fn players_url(&self) -> String {
        format!("{}/players/nfl", self.base_url)
    }

    /// Parse the players payload: an object keyed by player ID
    ///
    /// Records come back ordered by ID so the matcher sees a stable order.
    pub fn parse_players(body: &str) -> Result<Vec<RawPlayerRecord>> {
        let players: BTreeMap<String, SleeperPlayer> =
            serde_json::from_str(body).context("Failed to parse Sleeper players response")?;

        Ok(players.into_iter().map(|(id, player)| player.into_raw(id)).collect())
    }
}

#[async_trait::async_trait]
impl RosterSource for SleeperSource {
    async fn fetch(&self) -> Result<Vec<RawPlayerRecord>> {
        let url = self.players_url();
        info!("Fetching Sleeper players from {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("Failed to send request to {}", url))?;

        if !response.status().is_success() {
            anyhow::bail!("Sleeper API request failed with status: {}", response.status());
        }

        let body = response.text().await.context("Failed to read Sleeper response body")?;
        let players = Self::parse_players(&body)?;
        info!("Found {} players in Sleeper database", players.len());
        Ok(players)
    }

    fn name(&self) -> String {
        "sleeper".to_string()
    }
}

/// Roster stored as a JSON array of raw player records
#[derive(Debug, Clone)]
pub struct JsonRosterSource {
    path: PathBuf,
}

impl JsonRosterSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait::async_trait]
impl RosterSource for JsonRosterSource {
    async fn fetch(&self) -> Result<Vec<RawPlayerRecord>> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("Failed to read roster file {:?}", self.path))?;

        let players: Vec<RawPlayerRecord> = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse roster file {:?}", self.path))?;

        info!("Loaded {} players from {:?}", players.len(), self.path);
        Ok(players)
    }

    fn name(&self) -> String {
        format!("file:{}", self.path.display())
    }
}

/// Run an async operation, retrying failures with exponential backoff
pub async fn run_with_retry<F, Fut, T>(mut f: F, retry_config: &RetryConfig) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let max_delay = Duration::from_secs(retry_config.max_delay_secs);
    let mut delay = Duration::from_secs(retry_config.initial_delay_secs);
    let mut attempt = 1;

    loop {
        match f().await {
            Ok(result) => return Ok(result),
            Err(e) if attempt >= retry_config.max_retries => {
                return Err(e.context(format!("Giving up after {} attempts", attempt)));
            }
            Err(e) => {
                warn!("Attempt {} failed: {:#}, retrying in {:?}", attempt, e, delay);
                sleep(delay).await;

                delay = delay.mul_f64(retry_config.backoff_multiplier).min(max_delay);
                attempt += 1;
            }
        }
    }
}

/// Fetch a roster under the retry policy
pub async fn fetch_with_retry(
    source: &dyn RosterSource,
    retry_config: &RetryConfig,
) -> Result<Vec<RawPlayerRecord>> {
    run_with_retry(|| source.fetch(), retry_config)
        .await
        .with_context(|| format!("Failed to fetch roster from {}", source.name()))
}

/// Validate raw records, skipping malformed ones with a warning
///
/// Returns the valid records and the number skipped.
pub fn validate_records(raw: Vec<RawPlayerRecord>, provider: &str) -> (Vec<PlayerRecord>, usize) {
    let mut records = Vec::with_capacity(raw.len());
    let mut skipped = 0;

    for record in raw {
        match PlayerRecord::try_from(record) {
            Ok(record) => records.push(record),
            Err(e) => {
                warn!(provider = provider, "Skipping malformed record: {}", e);
                skipped += 1;
            }
        }
    }

    (records, skipped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tempfile::TempDir;

    fn no_delay(max_retries: u32) -> RetryConfig {
        RetryConfig { max_retries, initial_delay_secs: 0, max_delay_secs: 0, backoff_multiplier: 2.0 }
    }

    #[test]
    fn test_parse_sleeper_players() {
        let body = r#"{
            "4046": {"player_id": "4046", "full_name": "Patrick Mahomes", "position": "QB", "team": "KC"},
            "1166": {"player_id": "1166", "first_name": "Kenneth", "last_name": "Walker", "position": "RB", "team": "SEA", "fantasy_positions": ["RB"]},
            "KC": {"player_id": "KC", "first_name": "Kansas City", "last_name": "Chiefs", "position": "DEF", "team": "KC"},
            "9999": {"player_id": "9999", "full_name": "Retired Guy", "position": null, "team": null}
        }"#;

        let players = SleeperSource::parse_players(body).unwrap();
        let ids: Vec<_> = players.iter().filter_map(|p| p.source_id.as_deref()).collect();
        assert_eq!(ids, vec!["1166", "4046", "9999", "KC"]);
        assert_eq!(players[0].name.as_deref(), Some("Kenneth Walker"));
        assert_eq!(players[1].name.as_deref(), Some("Patrick Mahomes"));
        assert!(players[2].position.is_none());
    }

    #[test]
    fn test_parse_sleeper_rejects_garbage() {
        assert!(SleeperSource::parse_players("[1, 2, 3]").is_err());
    }

    #[test]
    fn test_sleeper_url() {
        let source = SleeperSource::new("https://api.sleeper.app/v1/", Duration::from_secs(5)).unwrap();
        assert_eq!(source.players_url(), "https://api.sleeper.app/v1/players/nfl");
    }

    #[tokio::test]
    async fn test_json_roster_source() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("espn.json");
        tokio::fs::write(
            &path,
            r#"[
                {"espn_id": "4361548", "name": "Amon-Ra St. Brown", "position": "WR", "team": "DET"},
                {"id": "3918449", "name": "T.J. Hockenson", "position": "TE"}
            ]"#,
        )
        .await
        .unwrap();

        let players = JsonRosterSource::new(&path).fetch().await.unwrap();
        assert_eq!(players.len(), 2);
        assert_eq!(players[0].source_id.as_deref(), Some("4361548"));
        assert!(players[1].team.is_none());

        let missing = JsonRosterSource::new(temp_dir.path().join("absent.json"));
        assert!(missing.fetch().await.is_err());
    }

    #[tokio::test]
    async fn test_retry_until_success() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result = run_with_retry(
            move || async move {
                let attempt = calls.fetch_add(1, Ordering::SeqCst) + 1;
                if attempt < 3 {
                    anyhow::bail!("transient failure {}", attempt);
                }
                Ok(attempt)
            },
            &no_delay(3),
        )
        .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_gives_up() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<()> = run_with_retry(
            move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                anyhow::bail!("always down")
            },
            &no_delay(2),
        )
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_validate_records_skips_malformed() {
        let raw = vec![
            RawPlayerRecord {
                source_id: Some("1".to_string()),
                name: Some("Bijan Robinson".to_string()),
                position: Some("RB".to_string()),
                team: Some("ATL".to_string()),
            },
            RawPlayerRecord {
                source_id: Some("2".to_string()),
                name: None,
                position: Some("WR".to_string()),
                team: None,
            },
            RawPlayerRecord {
                source_id: Some("3".to_string()),
                name: Some("No Position".to_string()),
                position: Some("  ".to_string()),
                team: None,
            },
        ];

        let (records, skipped) = validate_records(raw, "test");
        assert_eq!(records.len(), 1);
        assert_eq!(skipped, 2);
        assert_eq!(records[0].source_id, "1");
    }
}
