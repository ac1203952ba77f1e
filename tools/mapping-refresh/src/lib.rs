//! Mapping Refresh - Reconciles Sleeper and ESPN player identities
//!
//! Fetches both provider rosters, links them with `player-linkage` and merges
//! the results into the `mapping-store` cache layer.

pub mod config;
pub mod driver;
pub mod logging;
pub mod sources;

pub use config::{load_config, LoggingConfig, RefreshConfig, RetryConfig, SourceConfig};
pub use driver::{render_lookup, render_summary, Reconciler, RefreshOptions, RefreshSummary};
pub use sources::{JsonRosterSource, RosterSource, SleeperSource};
