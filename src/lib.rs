//! # dbsweep
//!
//! An incremental database-to-search-feed traversal engine.
//!
//! dbsweep repeatedly polls a relational table in bounded batches, converts
//! each row into a content-bearing document with a stable, content-addressed
//! identity, and queues documents for a downstream feed consumer. Crawl
//! state survives process restarts; a checkpoint-reconciliation protocol
//! decides on every resume whether documents that were dispatched but never
//! acknowledged must be sent again. Delivery is at-least-once, with
//! deterministic document IDs as the deduplication anchor.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌─────────────┐
//! │  SqlSource   │──▶│ Traversal    │──▶│  Document   │
//! │ LIMIT/OFFSET │   │ Engine       │   │  Queue      │──▶ consumer
//! └──────────────┘   │ mode detect  │   │ + in-flight │◀── checkpoint
//!                    │ materialize  │   └──────┬──────┘
//!                    └──────┬───────┘          │
//!                           ▼                  ▼
//!                    ┌──────────────┐   ┌─────────────┐
//!                    │ GlobalState  │──▶│ StateStore  │
//!                    └──────────────┘   └─────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Documents, rows, property values |
//! | [`checksum`] | SHA-1 identity and content hashing |
//! | [`render`] | Row-to-XML content rendering |
//! | [`mode`] | Execution-mode detection |
//! | [`materialize`] | Per-mode row-to-document conversion |
//! | [`source`] | Bounded window queries against the source |
//! | [`state`] | Crawl state, document queues, persistence |
//! | [`checkpoint`] | Checkpoint tokens and reconciliation |
//! | [`traverse`] | The crawl state machine |
//! | [`error`] | Error taxonomy |

pub mod checkpoint;
pub mod checksum;
pub mod config;
pub mod error;
pub mod materialize;
pub mod mode;
pub mod models;
pub mod render;
pub mod source;
pub mod state;
pub mod traverse;
