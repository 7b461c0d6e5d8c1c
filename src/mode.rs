//! Execution-mode detection.
//!
//! The operator selects a document-production mode implicitly, by aliasing
//! columns in the source query to sentinel names. The mode is classified
//! from the column layout of the first row the engine ever sees and then
//! held for the lifetime of the engine instance, even if later batches
//! carry different columns.

use std::fmt;

use crate::models::Row;

/// Column alias whose value is the target locator for metadata-URL feeds.
pub const URL_COLUMN: &str = "dbconn_url";
/// Column alias carrying character large-object content.
pub const CLOB_COLUMN: &str = "dbconn_clob";
/// Column alias carrying binary large-object content.
pub const BLOB_COLUMN: &str = "dbconn_blob";
/// Column alias carrying a fetch locator for large-object rows.
pub const LOB_URL_COLUMN: &str = "dbconn_lob_url";
/// Column alias carrying the document title for large-object rows.
pub const TITLE_COLUMN: &str = "dbconn_title";
/// Column alias carrying the last-modified timestamp.
pub const LAST_MODIFIED_COLUMN: &str = "dbconn_last_mod";
/// Column alias overriding the MIME type for metadata-URL feeds.
pub const MIME_TYPE_COLUMN: &str = "mime_type";

/// How a row is materialized into a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    /// Render the whole row as document content.
    Normal,
    /// The row points at an externally hosted document; columns become metadata.
    MetadataUrl,
    /// A designated column carries the document text.
    Clob,
    /// A designated column carries the document bytes.
    Blob,
}

impl ExecutionMode {
    /// Classify the source's column layout from one row.
    ///
    /// A URL sentinel takes priority over a CLOB sentinel, which takes
    /// priority over a BLOB sentinel; none of them means the whole row is
    /// rendered as content. Matching is case-insensitive.
    pub fn classify(row: &Row) -> Self {
        let has = |name: &str| row.keys().any(|k| k.eq_ignore_ascii_case(name));
        if has(URL_COLUMN) {
            ExecutionMode::MetadataUrl
        } else if has(CLOB_COLUMN) {
            ExecutionMode::Clob
        } else if has(BLOB_COLUMN) {
            ExecutionMode::Blob
        } else {
            ExecutionMode::Normal
        }
    }

    pub fn is_metadata_url(self) -> bool {
        self == ExecutionMode::MetadataUrl
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExecutionMode::Normal => "normal",
            ExecutionMode::MetadataUrl => "metadata-url",
            ExecutionMode::Clob => "clob",
            ExecutionMode::Blob => "blob",
        };
        write!(f, "{}", s)
    }
}
