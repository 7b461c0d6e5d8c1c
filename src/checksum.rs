//! Deterministic identity and content hashing.
//!
//! Document IDs are the SHA-1 of a canonical encoding of the primary-key
//! values: the per-key value lengths (or `-1` for NULL) joined with commas
//! inside parentheses, followed by the concatenated values in declared key
//! order. Keys `["id", "lastName"]` with values `1` and `last_01` encode as
//! `(1,7)1last_01`. Because only key values participate, the ID is stable
//! across content changes to the same logical row, which is what makes
//! at-least-once redelivery idempotent downstream.
//!
//! Text is hashed as UTF-8 on every platform.

use sha1::{Digest, Sha1};

use crate::error::{EngineError, Result};
use crate::models::Row;

/// Lower-case hex SHA-1 of a byte buffer, two characters per byte,
/// most-significant nibble first.
pub fn sha1_hex(buf: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(buf);
    hex::encode(hasher.finalize())
}

/// Resolve a configured primary-key name against the row's actual column
/// names, ignoring case. Operators frequently enter key names whose case
/// differs from the column alias the driver reports.
pub(crate) fn resolve_key<'a>(row: &'a Row, key: &str) -> Result<&'a str> {
    row.keys()
        .find(|k| k.eq_ignore_ascii_case(key))
        .map(String::as_str)
        .ok_or_else(|| EngineError::PrimaryKeyMismatch {
            key: key.to_string(),
        })
}

/// Generate the document ID for a row from its primary-key values.
///
/// Fails when the key list is empty, the row has no columns, or a key has no
/// case-insensitive match among the row's column names.
pub fn generate_docid(primary_keys: &[String], row: &Row) -> Result<String> {
    if primary_keys.is_empty() {
        return Err(EngineError::EmptyPrimaryKeys);
    }
    if row.is_empty() {
        return Err(EngineError::EmptyRow);
    }

    let mut lengths = Vec::with_capacity(primary_keys.len());
    let mut values = String::new();
    for key in primary_keys {
        let resolved = resolve_key(row, key)?;
        match row[resolved].render() {
            Some(v) => {
                lengths.push(v.chars().count().to_string());
                values.push_str(&v);
            }
            None => lengths.push("-1".to_string()),
        }
    }

    let encoded = format!("({}){}", lengths.join(","), values);
    Ok(sha1_hex(encoded.as_bytes()))
}
