//! Command-line interface for inspecting and maintaining the cache.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use stravacache::{CacheConfig, ResponseCache};

mod entry;
mod stats;

/// Inspect and maintain the Strava response cache.
#[derive(Parser, Debug)]
#[command(name = "stravacache", version, about)]
pub(crate) struct Cli {
    /// Config file (default: ~/.stravacache/config.json)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Storage root, overriding config and environment
    #[arg(long, global = true)]
    pub cache_dir: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub(crate) enum Command {
    /// Show record counts, sizes, and age range
    Stats {
        /// Print the raw JSON report
        #[arg(long)]
        json: bool,
    },
    /// Remove records older than their category's TTL
    ClearExpired,
    /// Remove all records, or all records of one category
    Clear {
        #[arg(long)]
        category: Option<String>,
    },
    /// Print a cached payload
    Get { category: String, key: String },
    /// Store a JSON payload
    Set {
        category: String,
        key: String,
        /// Payload as a JSON document
        payload: String,
    },
    /// Remove one record
    Delete { category: String, key: String },
}

/// Install the tracing subscriber. `RUST_LOG` wins; the default is `warn`.
pub(crate) fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

pub(crate) fn run(cli: Cli) -> Result<()> {
    let cache = open_cache(cli.config.as_deref(), cli.cache_dir)?;

    match cli.command {
        Command::Stats { json } => stats::cmd_stats(&cache, json),
        Command::ClearExpired => stats::cmd_clear_expired(&cache),
        Command::Clear { category } => stats::cmd_clear(&cache, category.as_deref()),
        Command::Get { category, key } => entry::cmd_get(&cache, &category, &key),
        Command::Set {
            category,
            key,
            payload,
        } => entry::cmd_set(&cache, &category, &key, &payload),
        Command::Delete { category, key } => entry::cmd_delete(&cache, &category, &key),
    }
}

/// Resolve configuration (file, then environment, then flags) and open the cache.
fn open_cache(config_path: Option<&Path>, cache_dir: Option<PathBuf>) -> Result<ResponseCache> {
    let mut config = match config_path {
        Some(path) => {
            let mut config = CacheConfig::load_from_path(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?;
            config.apply_overrides(|name| std::env::var(name).ok())?;
            config
        }
        None => CacheConfig::load().context("Failed to load cache config")?,
    };

    if let Some(dir) = cache_dir {
        config.cache_dir = dir;
    }
    Ok(ResponseCache::new(config))
}
