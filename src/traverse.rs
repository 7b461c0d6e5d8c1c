//! Crawl state machine.
//!
//! Drives the full loop: fetch a bounded window of rows, classify the
//! execution mode on the first batch ever seen, materialize rows into
//! documents, queue them for the consumer, and reconcile checkpoints on
//! resume. One engine instance owns one source's [`GlobalState`]; callers
//! must serialize `start_cycle`/`resume`; there is no internal locking and
//! no parallel fetch-ahead.
//!
//! A crawl cycle is one pass from offset zero until a fetch returns no rows
//! and the queue is empty. Completion is gated on the queue, not on the
//! fetch result alone, and is the only point where state is persisted.

use chrono::Utc;
use tracing::{debug, info};

use crate::checkpoint::{self, Disposition};
use crate::config::SourceConfig;
use crate::error::{EngineError, Result};
use crate::materialize::{materialize, MaterializeContext};
use crate::mode::ExecutionMode;
use crate::models::Document;
use crate::render::RowRenderer;
use crate::source::SourceClient;
use crate::state::{GlobalState, StateStore};

const DEFAULT_BATCH_HINT: usize = 100;
/// The engine fetches this many batch-hints' worth of rows per query to
/// stay ahead of the consumer's pull rate.
const PREFETCH_FACTOR: usize = 3;

/// Identity settings the materializer needs, lifted out of the full config
/// so tests can drive the engine with an in-memory source.
#[derive(Debug, Clone)]
pub struct TraversalConfig {
    pub db_name: String,
    pub hostname: String,
    pub primary_keys: Vec<String>,
    pub base_url: Option<String>,
}

impl From<&SourceConfig> for TraversalConfig {
    fn from(config: &SourceConfig) -> Self {
        Self {
            db_name: config.db_name.clone(),
            hostname: config.hostname.clone(),
            primary_keys: config.primary_keys.clone(),
            base_url: config.base_url.clone(),
        }
    }
}

/// Outcome of one traversal step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Traversal {
    /// Documents are queued and ready to drain.
    Batch(usize),
    /// The source is drained and nothing is left to flush. Distinct from an
    /// error: the caller should back off, then resume for the next cycle.
    CycleComplete { records: u64 },
}

/// The traversal engine for one configured source.
pub struct TraversalEngine {
    source: Box<dyn SourceClient>,
    renderer: Box<dyn RowRenderer>,
    store: Box<dyn StateStore>,
    config: TraversalConfig,
    state: GlobalState,
    batch_hint: usize,
    /// Execution mode, undetected until the first non-empty batch and then
    /// held for the lifetime of this instance.
    mode: Option<ExecutionMode>,
}

impl TraversalEngine {
    /// Build an engine, restoring persisted state when present.
    pub fn new(
        source: Box<dyn SourceClient>,
        renderer: Box<dyn RowRenderer>,
        store: Box<dyn StateStore>,
        config: TraversalConfig,
    ) -> Result<Self> {
        let state = store.load()?.unwrap_or_default();
        Ok(Self {
            source,
            renderer,
            store,
            config,
            state,
            batch_hint: DEFAULT_BATCH_HINT,
            mode: None,
        })
    }

    /// Set the consumer's batch-size hint. Non-positive hints are rejected.
    pub fn set_batch_hint(&mut self, hint: usize) -> Result<()> {
        if hint == 0 {
            return Err(EngineError::InvalidBatchHint(hint));
        }
        self.batch_hint = hint;
        Ok(())
    }

    pub fn batch_hint(&self) -> usize {
        self.batch_hint
    }

    pub fn state(&self) -> &GlobalState {
        &self.state
    }

    pub fn mode(&self) -> Option<ExecutionMode> {
        self.mode
    }

    /// Begin a fresh crawl cycle: wipe persisted state, reset the cursor and
    /// queues, then traverse.
    pub async fn start_cycle(&mut self) -> Result<Traversal> {
        info!(db = %self.config.db_name, "crawl cycle started");
        self.store.clear()?;
        self.state.reset();
        self.traverse().await
    }

    /// Resume traversal with the checkpoint token the consumer last
    /// persisted, deciding the fate of any in-flight documents first.
    ///
    /// A token equal to the current boundary means the prior dispatch was
    /// absorbed; equal to the old boundary (or carrying the `NO_DOCID`
    /// sentinel) means it was not, so in-flight documents are requeued ahead
    /// of the queue. Anything else is treated as absorbed, the conservative
    /// default that cannot loop forever. The caveat either way: documents
    /// that arrived but whose checkpoint persist failed are simply sent
    /// again, which identity-stable IDs make harmless.
    pub async fn resume(&mut self, token: &str) -> Result<Traversal> {
        let current = checkpoint::current_token(&self.state);
        let old = checkpoint::old_token(&self.state);
        match checkpoint::reconcile(token, &current, &old) {
            Disposition::Confirmed => {
                debug!(in_flight = self.state.in_flight_len(), "dispatch confirmed");
                self.state.clear_in_flight();
            }
            Disposition::Redispatch => {
                info!(
                    in_flight = self.state.in_flight_len(),
                    "dispatch unconfirmed, requeueing in-flight documents"
                );
                self.state.requeue_in_flight();
            }
            Disposition::Unrecognized => {
                debug!(token, "checkpoint matches neither boundary, ignoring");
            }
        }
        self.traverse().await
    }

    /// Hand the next queued document to the consumer. The document stays
    /// tracked as in-flight until a later checkpoint confirms it.
    pub fn next_document(&mut self) -> Option<Document> {
        self.state.drain_one()
    }

    /// The token the consumer should persist once it has absorbed everything
    /// drained so far.
    pub fn checkpoint(&self) -> String {
        checkpoint::current_token(&self.state)
    }

    async fn traverse(&mut self) -> Result<Traversal> {
        if self.state.queue_len() == 0 {
            let fetched = self.fetch_batch().await?;
            if fetched == 0 {
                let records = self.state.record_count;
                self.state.mark_new_sweep();
                // The queue can still hold documents at this point; only an
                // empty queue completes the cycle.
                if self.state.queue_len() == 0 {
                    self.store.save(&self.state)?;
                    info!(
                        db = %self.config.db_name,
                        records, "crawl cycle complete"
                    );
                    return Ok(Traversal::CycleComplete { records });
                }
            }
        }
        Ok(Traversal::Batch(self.state.queue_len()))
    }

    /// Fetch one window of rows and enqueue their documents.
    ///
    /// The whole batch is materialized before any state changes, so an
    /// error leaves cursor, timestamps, and queue untouched.
    async fn fetch_batch(&mut self) -> Result<usize> {
        let started = Utc::now();
        let limit = (PREFETCH_FACTOR * self.batch_hint) as u32;
        let cursor = self.state.cursor;

        let rows = self
            .source
            .fetch(cursor, limit)
            .await
            .map_err(|cause| EngineError::SourceQuery { cursor, cause })?;
        if rows.is_empty() {
            self.state.query_execution_time = Some(started);
            return Ok(0);
        }

        let mode = match self.mode {
            Some(mode) => mode,
            None => {
                let mode = ExecutionMode::classify(&rows[0]);
                info!(%mode, "execution mode detected");
                if mode.is_metadata_url() {
                    self.state.metadata_url_feed = true;
                }
                self.mode = Some(mode);
                mode
            }
        };

        let ctx = MaterializeContext {
            db_name: &self.config.db_name,
            hostname: &self.config.hostname,
            primary_keys: &self.config.primary_keys,
            base_url: self.config.base_url.as_deref(),
            renderer: self.renderer.as_ref(),
        };
        let docs = rows
            .iter()
            .map(|row| materialize(mode, row, &ctx))
            .collect::<Result<Vec<_>>>()?;

        self.state.cursor += rows.len() as u64;
        self.state.record_count += rows.len() as u64;
        self.state.query_execution_time = Some(started);
        for doc in docs {
            self.state.enqueue(doc);
        }
        debug!(
            fetched = rows.len(),
            queued = self.state.queue_len(),
            cursor = self.state.cursor,
            "batch enqueued"
        );
        Ok(rows.len())
    }
}
