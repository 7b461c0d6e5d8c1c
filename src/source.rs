//! Source query primitive.
//!
//! The engine only ever asks the source one question: "give me up to N rows
//! starting at offset C". The [`SourceClient`] trait captures that contract;
//! [`SqlSource`] answers it by windowing the operator's configured query
//! with LIMIT/OFFSET against SQLite.

use std::str::FromStr;

use anyhow::Result;
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Column, Row as _, TypeInfo, ValueRef};

use crate::config::SourceConfig;
use crate::models::{ColumnValue, Row};

/// Bounded window query against the source.
///
/// An empty result marks the end of the source for the current crawl cycle.
/// The source must keep row ordering stable across calls with the same
/// cursor; the engine never re-reads rows it already consumed within a
/// sweep. Failures are fatal for the call; no retries happen at this layer.
#[async_trait]
pub trait SourceClient: Send + Sync {
    async fn fetch(&self, cursor: u64, limit: u32) -> Result<Vec<Row>>;
}

/// SQLite-backed [`SourceClient`] over the operator's configured query.
pub struct SqlSource {
    pool: SqlitePool,
    query: String,
}

impl SqlSource {
    pub async fn connect(config: &SourceConfig) -> Result<Self> {
        let options =
            SqliteConnectOptions::from_str(&format!("sqlite:{}", config.path.display()))?;

        let pool = SqlitePoolOptions::new()
            .max_connections(2)
            .connect_with(options)
            .await?;

        Ok(Self {
            pool,
            query: config.query.clone(),
        })
    }
}

#[async_trait]
impl SourceClient for SqlSource {
    async fn fetch(&self, cursor: u64, limit: u32) -> Result<Vec<Row>> {
        let windowed = format!("SELECT * FROM ({}) LIMIT ? OFFSET ?", self.query);
        let rows = sqlx::query(&windowed)
            .bind(limit as i64)
            .bind(cursor as i64)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(decode_row).collect()
    }
}

fn decode_row(row: &SqliteRow) -> Result<Row> {
    let mut out = Row::new();
    for col in row.columns() {
        let idx = col.ordinal();
        let raw = row.try_get_raw(idx)?;
        let value = if raw.is_null() {
            ColumnValue::Null
        } else {
            match raw.type_info().name() {
                "INTEGER" | "BOOLEAN" => ColumnValue::Int(row.try_get::<i64, _>(idx)?),
                "REAL" => ColumnValue::Real(row.try_get::<f64, _>(idx)?),
                "BLOB" => ColumnValue::Bytes(row.try_get::<Vec<u8>, _>(idx)?),
                _ => ColumnValue::Text(row.try_get::<String, _>(idx)?),
            }
        };
        out.insert(col.name().to_string(), value);
    }
    Ok(out)
}

/// In-memory [`SourceClient`] over a fixed row list, for tests and dry runs.
pub struct MemorySource {
    rows: Vec<Row>,
}

impl MemorySource {
    pub fn new(rows: Vec<Row>) -> Self {
        Self { rows }
    }
}

#[async_trait]
impl SourceClient for MemorySource {
    async fn fetch(&self, cursor: u64, limit: u32) -> Result<Vec<Row>> {
        let start = (cursor as usize).min(self.rows.len());
        let end = (start + limit as usize).min(self.rows.len());
        Ok(self.rows[start..end].to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(n: usize) -> Vec<Row> {
        (0..n)
            .map(|i| {
                [("id".to_string(), ColumnValue::Int(i as i64))]
                    .into_iter()
                    .collect()
            })
            .collect()
    }

    #[tokio::test]
    async fn test_memory_source_windows() {
        let source = MemorySource::new(rows(5));
        let batch = source.fetch(0, 3).await.unwrap();
        assert_eq!(batch.len(), 3);
        assert_eq!(batch[0]["id"], ColumnValue::Int(0));

        let batch = source.fetch(3, 3).await.unwrap();
        assert_eq!(batch.len(), 2);

        let batch = source.fetch(5, 3).await.unwrap();
        assert!(batch.is_empty());
    }

    #[tokio::test]
    async fn test_memory_source_past_end() {
        let source = MemorySource::new(rows(2));
        assert!(source.fetch(10, 3).await.unwrap().is_empty());
    }
}
