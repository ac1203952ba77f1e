//! Player mapping refresh utility
//!
//! Refreshes the Sleeper to ESPN player ID cache. Curated mappings are read but
//! never written.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use mapping_refresh::config::{load_config, DEFAULT_CONFIG_FILE};
use mapping_refresh::logging::initialize_logging;
use mapping_refresh::{render_lookup, render_summary, Reconciler, RefreshOptions};
use mapping_store::MergeMode;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "mapping-refresh")]
#[command(about = "Refresh player ID mappings between Sleeper and ESPN")]
#[command(version)]
struct Cli {
    /// Perform full refresh (replace all cached mappings)
    #[arg(long, conflicts_with = "update")]
    full: bool,

    /// Perform incremental update (default)
    #[arg(long)]
    update: bool,

    /// Interactive mode for manual mapping
    #[arg(long)]
    interactive: bool,

    /// Configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Match and report without saving the cache
    #[arg(long)]
    dry_run: bool,

    /// Override the configured log level
    #[arg(long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Search the stored mappings by player name
    Lookup {
        /// Player name, or part of it
        name: String,

        /// Maximum number of results
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },
}

impl Cli {
    fn refresh_options(&self) -> RefreshOptions {
        let mode = if self.full { MergeMode::Full } else { MergeMode::Incremental };
        RefreshOptions { mode, dry_run: self.dry_run }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let mut config = load_config(&cli.config).context("Failed to load configuration")?;
    if let Some(level) = &cli.log_level {
        config.logging.level = level.clone();
        config.validate()?;
    }
    initialize_logging(&config.logging)?;

    if cli.interactive {
        println!("🎮 Interactive mode is not yet implemented");
        return Ok(());
    }

    let reconciler = Reconciler::from_config(&config)?;

    if let Some(Commands::Lookup { name, limit }) = &cli.command {
        let hits = reconciler.lookup(name, *limit).await?;
        print!("{}", render_lookup(name, &hits));
        return Ok(());
    }

    println!("{}", "=".repeat(60));
    println!("🔄 PLAYER MAPPING REFRESH");
    println!("{}", "=".repeat(60));

    let options = cli.refresh_options();
    info!(
        "Starting {} refresh: primary {}, secondary {}",
        options.mode,
        config.primary.describe(),
        config.secondary.describe()
    );

    let summary = reconciler.run(options).await?;
    print!("{}", render_summary(&summary));
    println!("🔄 Refresh complete!");

    Ok(())
}
