use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub source: SourceConfig,
    pub crawl: CrawlConfig,
    #[serde(default)]
    pub feed: FeedConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SourceConfig {
    /// SQLite database file holding the source table.
    pub path: PathBuf,
    /// Base query the engine windows with LIMIT/OFFSET. Must carry a stable
    /// ORDER BY so already-returned rows are never reordered between calls.
    pub query: String,
    /// Logical database name used in rendered content and display locators.
    pub db_name: String,
    /// Hostname used in synthesized display locators.
    pub hostname: String,
    /// Primary-key column names, in the order they enter the document ID.
    pub primary_keys: Vec<String>,
    /// Prefix for the `dbconn_url` column value in metadata-URL feeds.
    #[serde(default)]
    pub base_url: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CrawlConfig {
    /// Consumer batch-size hint; the engine prefetches three times this.
    #[serde(default = "default_batch_hint")]
    pub batch_hint: usize,
    /// Delay between crawl cycles once the source is drained.
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,
    /// Where the crawl state blob is persisted.
    pub state_path: PathBuf,
}

fn default_batch_hint() -> usize {
    100
}
fn default_retry_delay_secs() -> u64 {
    300
}

#[derive(Debug, Deserialize, Clone)]
pub struct FeedConfig {
    /// JSONL file the crawl command appends dispatched documents to.
    #[serde(default = "default_feed_output")]
    pub output: PathBuf,
    /// File the crawl command persists its checkpoint token in.
    #[serde(default = "default_checkpoint_path")]
    pub checkpoint_path: PathBuf,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            output: default_feed_output(),
            checkpoint_path: default_checkpoint_path(),
        }
    }
}

fn default_feed_output() -> PathBuf {
    PathBuf::from("./data/feed.jsonl")
}
fn default_checkpoint_path() -> PathBuf {
    PathBuf::from("./data/checkpoint")
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if config.source.query.trim().is_empty() {
        anyhow::bail!("source.query must not be empty");
    }

    if config.source.primary_keys.is_empty() {
        anyhow::bail!("source.primary_keys must list at least one column");
    }

    if config.source.db_name.trim().is_empty() || config.source.hostname.trim().is_empty() {
        anyhow::bail!("source.db_name and source.hostname must not be empty");
    }

    if config.crawl.batch_hint == 0 {
        anyhow::bail!("crawl.batch_hint must be > 0");
    }

    Ok(config)
}
