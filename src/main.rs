//! # dbsweep CLI
//!
//! Drives the traversal engine against a configured source and feeds the
//! resulting documents to a JSONL sink, persisting a checkpoint token after
//! every dispatched batch the way a real feed consumer would.
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `dbsweep crawl` | Run crawl cycles continuously, backing off between cycles |
//! | `dbsweep cycle` | Run a single crawl cycle to completion, then exit |
//! | `dbsweep status` | Print the persisted crawl state summary |
//!
//! ```bash
//! dbsweep --config ./dbsweep.toml crawl
//! ```

use std::fs::OpenOptions;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use dbsweep::config::{load_config, Config};
use dbsweep::render::XmlRenderer;
use dbsweep::source::SqlSource;
use dbsweep::state::{FileStateStore, StateStore};
use dbsweep::traverse::{Traversal, TraversalConfig, TraversalEngine};

/// dbsweep, an incremental database-to-search-feed traversal engine.
#[derive(Parser)]
#[command(
    name = "dbsweep",
    about = "Incrementally crawl a relational table into a document feed",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./dbsweep.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run crawl cycles continuously.
    ///
    /// Documents are appended to the feed output as JSON lines; the
    /// checkpoint token is persisted after every dispatched batch and used
    /// to resume, so restarts never lose acknowledged work. After each
    /// completed cycle the command sleeps for the configured retry delay.
    Crawl,

    /// Run a single crawl cycle to completion, then exit.
    Cycle,

    /// Print the persisted crawl state summary.
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    match cli.command {
        Commands::Crawl => run_crawl(&config, false).await,
        Commands::Cycle => run_crawl(&config, true).await,
        Commands::Status => run_status(&config),
    }
}

async fn build_engine(config: &Config) -> Result<TraversalEngine> {
    let source = SqlSource::connect(&config.source)
        .await
        .with_context(|| format!("Failed to open source at {}", config.source.path.display()))?;
    let store = FileStateStore::new(&config.crawl.state_path);
    let mut engine = TraversalEngine::new(
        Box::new(source),
        Box::new(XmlRenderer),
        Box::new(store),
        TraversalConfig::from(&config.source),
    )?;
    engine.set_batch_hint(config.crawl.batch_hint)?;
    Ok(engine)
}

async fn run_crawl(config: &Config, run_once: bool) -> Result<()> {
    let mut engine = build_engine(config).await?;

    // A persisted token means a previous run was mid-cycle; resume instead
    // of wiping state.
    let mut outcome = match read_token(&config.feed.checkpoint_path) {
        Some(token) => engine.resume(&token).await?,
        None => engine.start_cycle().await?,
    };

    loop {
        match outcome {
            Traversal::Batch(_) => {
                let written = dispatch_queue(&mut engine, &config.feed.output)?;
                let token = engine.checkpoint();
                persist_token(&config.feed.checkpoint_path, &token)?;
                println!("dispatched {} document(s)", written);
                outcome = engine.resume(&token).await?;
            }
            Traversal::CycleComplete { records } => {
                println!("crawl cycle complete: {} record(s)", records);
                if run_once {
                    break;
                }
                tokio::time::sleep(Duration::from_secs(config.crawl.retry_delay_secs)).await;
                let token = read_token(&config.feed.checkpoint_path)
                    .unwrap_or_else(|| engine.checkpoint());
                outcome = engine.resume(&token).await?;
            }
        }
    }
    Ok(())
}

/// Drain the queue into the feed sink. Every written document is tracked as
/// in-flight until the next checkpoint confirms it.
fn dispatch_queue(engine: &mut TraversalEngine, output: &Path) -> Result<usize> {
    if let Some(parent) = output.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut sink = OpenOptions::new().create(true).append(true).open(output)?;

    let mut written = 0;
    while let Some(doc) = engine.next_document() {
        serde_json::to_writer(&mut sink, &doc)?;
        sink.write_all(b"\n")?;
        written += 1;
    }
    sink.flush()?;
    Ok(written)
}

fn run_status(config: &Config) -> Result<()> {
    let store = FileStateStore::new(&config.crawl.state_path);
    match store.load()? {
        Some(state) => {
            println!("state: {}", config.crawl.state_path.display());
            println!("  cursor: {}", state.cursor);
            println!("  records this cycle: {}", state.record_count);
            println!("  queued documents: {}", state.queue_len());
            println!("  in-flight documents: {}", state.in_flight_len());
            println!("  metadata-url feed: {}", state.metadata_url_feed);
            match state.query_execution_time {
                Some(ts) => println!("  last fetch: {}", ts.to_rfc3339()),
                None => println!("  last fetch: never"),
            }
        }
        None => println!("no persisted state at {}", config.crawl.state_path.display()),
    }
    Ok(())
}

fn read_token(path: &Path) -> Option<String> {
    std::fs::read_to_string(path)
        .ok()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

fn persist_token(path: &Path, token: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, token)
        .with_context(|| format!("Failed to persist checkpoint to {}", path.display()))
}
