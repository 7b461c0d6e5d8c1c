//! Core data types that flow through the traversal engine.
//!
//! A [`Row`] is one relational record as returned by the source query. A
//! [`Document`] is its immutable, property-addressed form handed to the feed
//! consumer. Documents are built once through [`DocumentBuilder`] and never
//! mutated afterwards.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Well-known document property names.
pub mod prop {
    /// Stable document identity, derived from the primary-key values.
    pub const DOCID: &str = "docid";
    /// Feed action; always `"add"` for crawled rows.
    pub const ACTION: &str = "action";
    /// Document body (rendered row, CLOB text, or BLOB bytes).
    pub const CONTENT: &str = "content";
    /// SHA-1 over the rendered row, used to detect content changes between sweeps.
    pub const CHECKSUM: &str = "checksum";
    /// Locator shown to the end user.
    pub const DISPLAY_URL: &str = "displayurl";
    /// Locator the indexer fetches; only set for metadata-URL feeds.
    pub const SEARCH_URL: &str = "searchurl";
    pub const MIMETYPE: &str = "mimetype";
    pub const LAST_MODIFIED: &str = "lastmodified";
    pub const TITLE: &str = "title";
}

/// The feed action attached to every materialized document.
pub const ACTION_ADD: &str = "add";

/// One column value from a source row.
///
/// The source driver maps whatever the database returns onto these variants;
/// `Null` is preserved so key encoding and metadata handling can treat it
/// explicitly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ColumnValue {
    Text(String),
    Int(i64),
    Real(f64),
    Bytes(Vec<u8>),
    Timestamp(DateTime<Utc>),
    Null,
}

impl ColumnValue {
    pub fn is_null(&self) -> bool {
        matches!(self, ColumnValue::Null)
    }

    /// Render the value as the string used for identity encoding, metadata
    /// properties, and XML content. Returns `None` for `Null`.
    ///
    /// Byte values render as lower-case hex so the encoding is deterministic
    /// across platforms.
    pub fn render(&self) -> Option<String> {
        match self {
            ColumnValue::Text(s) => Some(s.clone()),
            ColumnValue::Int(i) => Some(i.to_string()),
            ColumnValue::Real(f) => Some(f.to_string()),
            ColumnValue::Bytes(b) => Some(hex::encode(b)),
            ColumnValue::Timestamp(ts) => {
                Some(ts.to_rfc3339_opts(chrono::SecondsFormat::Millis, true))
            }
            ColumnValue::Null => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ColumnValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            ColumnValue::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// Interpret the value as a timestamp. Text values are accepted when
    /// they parse as RFC 3339, which is how SQLite commonly stores them.
    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            ColumnValue::Timestamp(ts) => Some(*ts),
            ColumnValue::Text(s) => DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|dt| dt.with_timezone(&Utc)),
            _ => None,
        }
    }
}

/// One relational record: column name to value.
///
/// `BTreeMap` keeps iteration order deterministic, so rendered content (and
/// therefore row checksums) is stable across runs.
pub type Row = BTreeMap<String, ColumnValue>;

/// A single typed property value on a [`Document`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PropertyValue {
    Str(String),
    Timestamp(DateTime<Utc>),
    Binary(#[serde(with = "serde_base64")] Vec<u8>),
}

impl PropertyValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::Str(s) => Some(s),
            _ => None,
        }
    }
}

/// An immutable document materialized from one source row.
///
/// Maps property names to ordered value lists; at most one list per name.
/// Lookup of an absent property returns `None`, never an error.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Document {
    properties: BTreeMap<String, Vec<PropertyValue>>,
}

impl Document {
    pub fn builder() -> DocumentBuilder {
        DocumentBuilder::default()
    }

    /// All values for a property, or `None` if the property is absent.
    pub fn find_property(&self, name: &str) -> Option<&[PropertyValue]> {
        self.properties.get(name).map(Vec::as_slice)
    }

    /// The first value for a property.
    pub fn first_value(&self, name: &str) -> Option<&PropertyValue> {
        self.properties.get(name).and_then(|v| v.first())
    }

    /// The document identity, when present as a string property.
    pub fn docid(&self) -> Option<&str> {
        self.first_value(prop::DOCID).and_then(PropertyValue::as_str)
    }

    pub fn property_names(&self) -> impl Iterator<Item = &str> {
        self.properties.keys().map(String::as_str)
    }
}

/// Builder for [`Document`]; the only way to set properties.
#[derive(Debug, Default)]
pub struct DocumentBuilder {
    properties: BTreeMap<String, Vec<PropertyValue>>,
}

impl DocumentBuilder {
    /// Set a single string value for a property.
    pub fn property(mut self, name: &str, value: impl Into<String>) -> Self {
        self.properties
            .insert(name.to_string(), vec![PropertyValue::Str(value.into())]);
        self
    }

    /// Set a string property only when a value is present.
    pub fn maybe_property(self, name: &str, value: Option<String>) -> Self {
        match value {
            Some(v) => self.property(name, v),
            None => self,
        }
    }

    pub fn timestamp_property(mut self, name: &str, value: DateTime<Utc>) -> Self {
        self.properties
            .insert(name.to_string(), vec![PropertyValue::Timestamp(value)]);
        self
    }

    pub fn binary_property(mut self, name: &str, value: Vec<u8>) -> Self {
        self.properties
            .insert(name.to_string(), vec![PropertyValue::Binary(value)]);
        self
    }

    pub fn build(self) -> Document {
        Document {
            properties: self.properties,
        }
    }
}

/// Base64 encoding for binary property values in the persisted state blob.
mod serde_base64 {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(value: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        STANDARD.encode(value).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(&encoded).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_property_is_none() {
        let doc = Document::builder().property(prop::DOCID, "abc").build();
        assert!(doc.find_property("nonexistent").is_none());
        assert_eq!(doc.docid(), Some("abc"));
    }

    #[test]
    fn test_maybe_property_skips_none() {
        let doc = Document::builder()
            .maybe_property(prop::TITLE, None)
            .maybe_property(prop::MIMETYPE, Some("text/html".to_string()))
            .build();
        assert!(doc.find_property(prop::TITLE).is_none());
        assert_eq!(
            doc.first_value(prop::MIMETYPE).and_then(PropertyValue::as_str),
            Some("text/html")
        );
    }

    #[test]
    fn test_column_value_render() {
        assert_eq!(ColumnValue::Int(42).render().as_deref(), Some("42"));
        assert_eq!(ColumnValue::Null.render(), None);
        assert_eq!(
            ColumnValue::Bytes(vec![0xde, 0xad]).render().as_deref(),
            Some("dead")
        );
    }

    #[test]
    fn test_text_column_as_timestamp() {
        let v = ColumnValue::Text("2026-03-01T10:00:00Z".to_string());
        assert!(v.as_timestamp().is_some());
        assert!(ColumnValue::Int(5).as_timestamp().is_none());
    }

    #[test]
    fn test_binary_property_roundtrips_through_json() {
        let doc = Document::builder()
            .binary_property(prop::CONTENT, vec![1, 2, 3, 255])
            .build();
        let json = serde_json::to_string(&doc).unwrap();
        let back: Document = serde_json::from_str(&json).unwrap();
        assert_eq!(doc, back);
    }
}
