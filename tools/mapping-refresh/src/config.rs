//! Refresh configuration management
//!
//! Layers, lowest precedence first: built-in defaults, an optional TOML file,
//! then `MAPPING_REFRESH__*` environment variables.

use anyhow::{Context, Result};
use mapping_store::StoreConfig;
use player_linkage::{MatcherConfig, Position};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default configuration file, relative to the working directory
pub const DEFAULT_CONFIG_FILE: &str = "mapping-refresh.toml";

/// Environment variable prefix; nested keys are separated by `__`
pub const ENV_PREFIX: &str = "MAPPING_REFRESH";

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];
const LOG_FORMATS: [&str; 3] = ["pretty", "json", "compact"];

/// Main refresh configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefreshConfig {
    /// Mapping store files
    pub store: StoreConfig,

    /// Matcher and scorer settings
    pub matcher: MatcherConfig,

    /// Roster of the primary provider (Sleeper)
    pub primary: SourceConfig,

    /// Roster of the secondary provider (ESPN)
    pub secondary: SourceConfig,

    /// Retry policy for roster fetches
    pub retry: RetryConfig,

    pub logging: LoggingConfig,
}

/// Where a provider roster comes from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SourceConfig {
    /// Sleeper players endpoint
    Sleeper {
        base_url: String,
        timeout_secs: u64,
    },

    /// JSON array of raw player records on disk
    File { path: PathBuf },
}

/// Retry configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first
    pub max_retries: u32,

    /// Initial retry delay in seconds
    pub initial_delay_secs: u64,

    /// Maximum retry delay in seconds
    pub max_delay_secs: u64,

    /// Backoff multiplier
    pub backoff_multiplier: f64,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (pretty, json, compact)
    pub format: String,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            store: StoreConfig::default(),
            matcher: MatcherConfig {
                eligible_positions: Some(vec![Position::QB, Position::RB, Position::WR, Position::TE]),
                skip_free_agents: true,
                ..MatcherConfig::default()
            },
            primary: SourceConfig::Sleeper {
                base_url: "https://api.sleeper.app/v1".to_string(),
                timeout_secs: 30,
            },
            secondary: SourceConfig::File { path: PathBuf::from("./data/espn_players.json") },
            retry: RetryConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self { max_retries: 3, initial_delay_secs: 2, max_delay_secs: 30, backoff_multiplier: 2.0 }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), format: "pretty".to_string() }
    }
}

impl RefreshConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        self.matcher.validate().context("Invalid matcher configuration")?;

        if let Err(reason) = self.store.validate() {
            anyhow::bail!("Invalid store configuration: {}", reason);
        }

        self.primary.validate().context("Invalid primary source")?;
        self.secondary.validate().context("Invalid secondary source")?;

        if self.retry.max_retries == 0 {
            anyhow::bail!("retry.max_retries must be at least 1");
        }
        if self.retry.backoff_multiplier < 1.0 {
            anyhow::bail!("retry.backoff_multiplier must be at least 1.0");
        }

        if !LOG_LEVELS.contains(&self.logging.level.as_str()) {
            anyhow::bail!("Invalid log level: {}", self.logging.level);
        }
        if !LOG_FORMATS.contains(&self.logging.format.as_str()) {
            anyhow::bail!("Invalid log format: {}", self.logging.format);
        }

        Ok(())
    }
}

impl SourceConfig {
    fn validate(&self) -> Result<()> {
        match self {
            SourceConfig::Sleeper { base_url, timeout_secs } => {
                if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
                    anyhow::bail!("base_url must be an http(s) URL: {}", base_url);
                }
                if *timeout_secs == 0 {
                    anyhow::bail!("timeout_secs must be positive");
                }
            }
            SourceConfig::File { path } => {
                if path.as_os_str().is_empty() {
                    anyhow::bail!("file source needs a path");
                }
            }
        }
        Ok(())
    }

    /// Short description for logs and the summary
    pub fn describe(&self) -> String {
        match self {
            SourceConfig::Sleeper { base_url, .. } => format!("sleeper ({})", base_url),
            SourceConfig::File { path } => format!("file ({})", path.display()),
        }
    }
}

/// Load configuration from defaults, the given file and the process environment
pub fn load_config(path: &Path) -> Result<RefreshConfig> {
    load_config_with_env(path, config::Environment::with_prefix(ENV_PREFIX))
}

/// Load configuration with an explicit environment source
pub fn load_config_with_env(path: &Path, env: config::Environment) -> Result<RefreshConfig> {
    if path.exists() {
        tracing::debug!("Loading configuration from file: {:?}", path);
    }

    let defaults = config::Config::try_from(&RefreshConfig::default())
        .context("Failed to serialize default configuration")?;

    let settings = config::Config::builder()
        .add_source(defaults)
        .add_source(config::File::from(path).format(config::FileFormat::Toml).required(false))
        .add_source(env.prefix_separator("__").separator("__").try_parsing(true))
        .build()
        .with_context(|| format!("Failed to read configuration from {:?}", path))?;

    let config: RefreshConfig =
        settings.try_deserialize().context("Failed to parse configuration")?;
    config.validate()?;

    Ok(config)
}
