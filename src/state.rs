//! Persistent crawl state.
//!
//! One [`GlobalState`] exists per configured source. It carries the cursor
//! into the source table, the two document FIFOs (queued and in-flight), and
//! the timestamps the checkpoint protocol compares on resume. The engine
//! mutates it on every fetch; it is written to storage only when a crawl
//! cycle completes with an empty queue, so the crash-recovery window is
//! bounded to one batch of materialized-but-undelivered documents.
//!
//! The state is not safe for concurrent mutation; the engine assumes one
//! caller drives it at a time.

use std::collections::VecDeque;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{EngineError, Result};
use crate::models::Document;

/// Process-wide crawl state for one source.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct GlobalState {
    /// Row offset of the next unread row in the current sweep.
    pub cursor: u64,
    /// Wall-clock start of the most recent fetch.
    pub query_execution_time: Option<DateTime<Utc>>,
    /// Fetch timestamp captured when documents moved to in-flight.
    pub in_flight_query_time: Option<DateTime<Utc>>,
    /// Rows seen during the current crawl cycle.
    pub record_count: u64,
    /// Set once the source is classified as a metadata-URL feed.
    pub metadata_url_feed: bool,
    doc_queue: VecDeque<Document>,
    in_flight: VecDeque<Document>,
}

impl GlobalState {
    /// Append a materialized document to the queue.
    pub fn enqueue(&mut self, doc: Document) {
        self.doc_queue.push_back(doc);
    }

    /// Hand the queue head to the consumer.
    ///
    /// The document is retained in the in-flight sequence until a checkpoint
    /// confirms the consumer absorbed it. The first transfer after the
    /// in-flight sequence empties also snapshots the fetch timestamp, which
    /// anchors the "old" checkpoint token.
    pub fn drain_one(&mut self) -> Option<Document> {
        let doc = self.doc_queue.pop_front()?;
        if self.in_flight.is_empty() {
            self.in_flight_query_time = self.query_execution_time;
        }
        self.in_flight.push_back(doc.clone());
        Some(doc)
    }

    /// Transfer every queued document into the in-flight sequence,
    /// preserving order, leaving the queue empty.
    pub fn move_all_to_in_flight(&mut self) {
        if self.in_flight.is_empty() && !self.doc_queue.is_empty() {
            self.in_flight_query_time = self.query_execution_time;
        }
        self.in_flight.append(&mut self.doc_queue);
    }

    /// Splice the in-flight documents back ahead of the queue for
    /// redispatch, preserving their original order, then clear in-flight.
    pub fn requeue_in_flight(&mut self) {
        while let Some(doc) = self.in_flight.pop_back() {
            self.doc_queue.push_front(doc);
        }
        self.in_flight_query_time = None;
    }

    /// Discard the in-flight documents: the consumer absorbed them.
    pub fn clear_in_flight(&mut self) {
        self.in_flight.clear();
        self.in_flight_query_time = None;
    }

    pub fn peek_head(&self) -> Option<&Document> {
        self.doc_queue.front()
    }

    pub fn peek_in_flight_head(&self) -> Option<&Document> {
        self.in_flight.front()
    }

    pub fn queue_len(&self) -> usize {
        self.doc_queue.len()
    }

    pub fn in_flight_len(&self) -> usize {
        self.in_flight.len()
    }

    /// Rewind the cursor for the next full sweep once a fetch comes back
    /// empty. Queued documents are left alone.
    pub fn mark_new_sweep(&mut self) {
        self.cursor = 0;
        self.record_count = 0;
    }

    /// Reset for a fresh crawl cycle: cursor and counters to zero, both
    /// queues cleared. The metadata-URL flag survives, since the execution
    /// mode is sticky for the engine's lifetime.
    pub fn reset(&mut self) {
        let metadata_url_feed = self.metadata_url_feed;
        *self = GlobalState {
            metadata_url_feed,
            ..GlobalState::default()
        };
    }
}

/// Opaque load/save of the crawl state blob.
pub trait StateStore: Send + Sync {
    /// Load previously persisted state, or `None` when none exists.
    fn load(&self) -> Result<Option<GlobalState>>;
    /// Persist the state blob.
    fn save(&self, state: &GlobalState) -> Result<()>;
    /// Remove any persisted state.
    fn clear(&self) -> Result<()>;
}

/// JSON file-backed [`StateStore`].
pub struct FileStateStore {
    path: PathBuf,
}

impl FileStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn persistence_error(&self, cause: anyhow::Error) -> EngineError {
        EngineError::StatePersistence {
            path: self.path.clone(),
            cause,
        }
    }
}

impl StateStore for FileStateStore {
    fn load(&self) -> Result<Option<GlobalState>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&self.path)
            .map_err(|e| self.persistence_error(e.into()))?;
        let state = serde_json::from_str(&content)
            .map_err(|e| self.persistence_error(e.into()))?;
        debug!(path = %self.path.display(), "crawl state restored");
        Ok(Some(state))
    }

    fn save(&self, state: &GlobalState) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| self.persistence_error(e.into()))?;
        }
        let content =
            serde_json::to_string_pretty(state).map_err(|e| self.persistence_error(e.into()))?;
        std::fs::write(&self.path, content).map_err(|e| self.persistence_error(e.into()))?;
        debug!(path = %self.path.display(), "crawl state persisted");
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(self.persistence_error(e.into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{prop, Document};
    use tempfile::TempDir;

    fn doc(id: &str) -> Document {
        Document::builder().property(prop::DOCID, id).build()
    }

    #[test]
    fn test_queue_is_fifo() {
        let mut state = GlobalState::default();
        state.enqueue(doc("a"));
        state.enqueue(doc("b"));
        assert_eq!(state.drain_one().unwrap().docid(), Some("a"));
        assert_eq!(state.drain_one().unwrap().docid(), Some("b"));
        assert!(state.drain_one().is_none());
        assert_eq!(state.in_flight_len(), 2);
    }

    #[test]
    fn test_drain_stamps_in_flight_time_once() {
        let mut state = GlobalState::default();
        let t1 = Utc::now();
        state.query_execution_time = Some(t1);
        state.enqueue(doc("a"));
        state.enqueue(doc("b"));

        state.drain_one();
        assert_eq!(state.in_flight_query_time, Some(t1));

        // A later fetch time must not disturb the in-flight anchor while
        // documents are still unconfirmed.
        state.query_execution_time = Some(Utc::now());
        state.drain_one();
        assert_eq!(state.in_flight_query_time, Some(t1));
    }

    #[test]
    fn test_requeue_preserves_order() {
        let mut state = GlobalState::default();
        state.enqueue(doc("a"));
        state.enqueue(doc("b"));
        state.drain_one();
        state.drain_one();
        state.enqueue(doc("c"));

        state.requeue_in_flight();
        assert_eq!(state.in_flight_len(), 0);
        assert_eq!(state.peek_head().unwrap().docid(), Some("a"));
        let order: Vec<_> = (0..3)
            .map(|_| state.drain_one().unwrap().docid().unwrap().to_string())
            .collect();
        assert_eq!(order, ["a", "b", "c"]);
    }

    #[test]
    fn test_move_all_to_in_flight() {
        let mut state = GlobalState::default();
        state.query_execution_time = Some(Utc::now());
        state.enqueue(doc("a"));
        state.enqueue(doc("b"));
        state.move_all_to_in_flight();
        assert_eq!(state.queue_len(), 0);
        assert_eq!(state.in_flight_len(), 2);
        assert_eq!(state.peek_in_flight_head().unwrap().docid(), Some("a"));
        assert!(state.in_flight_query_time.is_some());
    }

    #[test]
    fn test_reset_keeps_mode_flag() {
        let mut state = GlobalState {
            cursor: 300,
            record_count: 300,
            metadata_url_feed: true,
            ..GlobalState::default()
        };
        state.enqueue(doc("a"));
        state.reset();
        assert_eq!(state.cursor, 0);
        assert_eq!(state.record_count, 0);
        assert_eq!(state.queue_len(), 0);
        assert!(state.metadata_url_feed);
    }

    #[test]
    fn test_file_store_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let store = FileStateStore::new(tmp.path().join("state.json"));

        assert!(store.load().unwrap().is_none());

        let mut state = GlobalState {
            cursor: 42,
            record_count: 42,
            query_execution_time: Some(Utc::now()),
            ..GlobalState::default()
        };
        state.enqueue(doc("a"));
        state.drain_one();
        state.enqueue(doc("b"));
        store.save(&state).unwrap();

        let restored = store.load().unwrap().unwrap();
        assert_eq!(restored.cursor, 42);
        assert_eq!(restored.queue_len(), 1);
        assert_eq!(restored.in_flight_len(), 1);
        assert_eq!(restored.peek_head().unwrap().docid(), Some("b"));
        assert_eq!(restored.peek_in_flight_head().unwrap().docid(), Some("a"));

        store.clear().unwrap();
        assert!(store.load().unwrap().is_none());
        // Clearing twice is fine.
        store.clear().unwrap();
    }
}
