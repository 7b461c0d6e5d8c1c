//! Checkpoint token encoding and reconciliation.
//!
//! On every resume the caller hands back the last token it persisted. The
//! engine compares it against two locally computed tokens: the "old" token
//! (fetch timestamp and head document of the in-flight sequence) and the
//! "current" token (latest fetch timestamp and head of the queue). A match
//! with the current token means the consumer absorbed everything it was
//! handed; a match with the old token means it did not, so the in-flight
//! documents go back to the front of the queue.
//!
//! A token containing the `NO_DOCID` sentinel is ambiguous: it was minted at
//! a moment when the queue had drained, possibly in the previous cycle
//! right before a new sweep refilled it, so it cannot be tied to either
//! boundary. Those tokens always trigger a redispatch; resending is safe
//! because document identity is deterministic. Any other unrecognized token
//! is treated as confirmed, which avoids infinite redispatch loops.

use chrono::{DateTime, SecondsFormat, Utc};

use crate::models::Document;
use crate::state::GlobalState;

pub const NO_TIMESTAMP: &str = "NO_TIMESTAMP";
pub const NO_DOCID: &str = "NO_DOCID";

/// What to do with the in-flight documents on resume.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// The consumer confirmed the prior dispatch; drop in-flight.
    Confirmed,
    /// The consumer did not confirm; requeue in-flight for redispatch.
    Redispatch,
    /// Token matches neither boundary; leave everything as-is.
    Unrecognized,
}

/// Encode a checkpoint token: `"(" timestamp ")" docid`, with sentinels for
/// either part when absent.
pub fn token(ts: Option<DateTime<Utc>>, docid: Option<&str>) -> String {
    format!(
        "({}){}",
        ts.map(format_timestamp)
            .unwrap_or_else(|| NO_TIMESTAMP.to_string()),
        docid.unwrap_or(NO_DOCID)
    )
}

/// The token describing what the engine is about to send: latest fetch
/// timestamp plus the queue head.
pub fn current_token(state: &GlobalState) -> String {
    token(
        state.query_execution_time,
        state.peek_head().and_then(Document::docid),
    )
}

/// The token describing what the engine last handed out: the in-flight fetch
/// timestamp plus the in-flight head. Falls back to an all-sentinel token
/// when nothing is in flight.
pub fn old_token(state: &GlobalState) -> String {
    match state.peek_in_flight_head() {
        Some(doc) => token(state.in_flight_query_time, doc.docid()),
        None => token(None, None),
    }
}

/// Compare the supplied token against both boundaries.
pub fn reconcile(supplied: &str, current: &str, old: &str) -> Disposition {
    if supplied == current {
        Disposition::Confirmed
    } else if supplied == old || supplied.contains(NO_DOCID) {
        Disposition::Redispatch
    } else {
        Disposition::Unrecognized
    }
}

fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}
