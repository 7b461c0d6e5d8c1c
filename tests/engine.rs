use std::path::{Path, PathBuf};
use std::str::FromStr;

use sqlx::sqlite::SqliteConnectOptions;
use sqlx::SqlitePool;
use tempfile::TempDir;

use dbsweep::config::SourceConfig;
use dbsweep::models::{prop, PropertyValue};
use dbsweep::render::XmlRenderer;
use dbsweep::source::SqlSource;
use dbsweep::state::FileStateStore;
use dbsweep::traverse::{Traversal, TraversalConfig, TraversalEngine};

async fn seed_employees(path: &Path, count: i64) -> SqlitePool {
    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))
        .unwrap()
        .create_if_missing(true);
    let pool = SqlitePool::connect_with(options).await.unwrap();

    sqlx::query("CREATE TABLE employees (id INTEGER PRIMARY KEY, name TEXT, salary REAL)")
        .execute(&pool)
        .await
        .unwrap();
    for i in 0..count {
        sqlx::query("INSERT INTO employees (id, name, salary) VALUES (?, ?, ?)")
            .bind(i)
            .bind(format!("employee-{}", i))
            .bind(1000.0 + i as f64)
            .execute(&pool)
            .await
            .unwrap();
    }
    pool
}

fn source_config(db_path: PathBuf, query: &str) -> SourceConfig {
    SourceConfig {
        path: db_path,
        query: query.to_string(),
        db_name: "employees".to_string(),
        hostname: "db.example.com".to_string(),
        primary_keys: vec!["ID".to_string()],
        base_url: None,
    }
}

async fn build_engine(tmp: &TempDir, source_cfg: &SourceConfig) -> TraversalEngine {
    let source = SqlSource::connect(source_cfg).await.unwrap();
    let mut engine = TraversalEngine::new(
        Box::new(source),
        Box::new(XmlRenderer),
        Box::new(FileStateStore::new(tmp.path().join("state.json"))),
        TraversalConfig::from(source_cfg),
    )
    .unwrap();
    engine.set_batch_hint(1).unwrap();
    engine
}

#[tokio::test]
async fn test_full_cycle_against_sqlite() {
    let tmp = TempDir::new().unwrap();
    let db_path = tmp.path().join("source.sqlite");
    seed_employees(&db_path, 7).await;

    let cfg = source_config(db_path, "SELECT id, name, salary FROM employees ORDER BY id");
    let mut engine = build_engine(&tmp, &cfg).await;

    let mut docids = Vec::new();
    let mut outcome = engine.start_cycle().await.unwrap();
    loop {
        match outcome {
            Traversal::Batch(_) => {
                while let Some(doc) = engine.next_document() {
                    assert_eq!(
                        doc.first_value(prop::ACTION).and_then(PropertyValue::as_str),
                        Some("add")
                    );
                    assert!(doc.find_property(prop::CONTENT).is_some());
                    assert!(doc.find_property(prop::CHECKSUM).is_some());
                    docids.push(doc.docid().unwrap().to_string());
                }
                let token = engine.checkpoint();
                outcome = engine.resume(&token).await.unwrap();
            }
            Traversal::CycleComplete { records } => {
                assert_eq!(records, 7);
                break;
            }
        }
    }

    assert_eq!(docids.len(), 7);
    let mut unique = docids.clone();
    unique.sort();
    unique.dedup();
    assert_eq!(unique.len(), 7, "document IDs must be distinct");
    assert!(tmp.path().join("state.json").exists());
}

#[tokio::test]
async fn test_restart_resweeps_from_persisted_state() {
    let tmp = TempDir::new().unwrap();
    let db_path = tmp.path().join("source.sqlite");
    seed_employees(&db_path, 3).await;

    let cfg = source_config(
        db_path.clone(),
        "SELECT id, name FROM employees ORDER BY id",
    );

    // First process: one full cycle, remembering the final checkpoint.
    let final_token;
    {
        let mut engine = build_engine(&tmp, &cfg).await;
        let mut outcome = engine.start_cycle().await.unwrap();
        while let Traversal::Batch(_) = outcome {
            while engine.next_document().is_some() {}
            let token = engine.checkpoint();
            outcome = engine.resume(&token).await.unwrap();
        }
        final_token = engine.checkpoint();
    }

    // Second process: state restores from disk, the cycle-boundary token
    // reconciles cleanly, and a fresh sweep starts from offset zero.
    let mut engine = build_engine(&tmp, &cfg).await;
    assert_eq!(engine.state().cursor, 0);
    let outcome = engine.resume(&final_token).await.unwrap();
    assert_eq!(outcome, Traversal::Batch(3));

    let first = engine.next_document().unwrap();
    // Same row, same identity: a restart cannot mint new document IDs.
    // SHA-1 of "(1)0" for the row with id = 0.
    assert_eq!(
        first.docid(),
        Some("1b31d5fa78c307e18236711bf8867d0b32afb949")
    );
}

#[tokio::test]
async fn test_blob_table_materializes_binary_content() {
    let tmp = TempDir::new().unwrap();
    let db_path = tmp.path().join("source.sqlite");

    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))
        .unwrap()
        .create_if_missing(true);
    let pool = SqlitePool::connect_with(options).await.unwrap();
    sqlx::query("CREATE TABLE attachments (id INTEGER PRIMARY KEY, dbconn_blob BLOB, label TEXT)")
        .execute(&pool)
        .await
        .unwrap();
    sqlx::query("INSERT INTO attachments (id, dbconn_blob, label) VALUES (1, ?, 'scan')")
        .bind(&b"BINARY PAYLOAD"[..])
        .execute(&pool)
        .await
        .unwrap();

    let cfg = SourceConfig {
        path: db_path,
        query: "SELECT id, dbconn_blob, label FROM attachments ORDER BY id".to_string(),
        db_name: "attachments".to_string(),
        hostname: "db.example.com".to_string(),
        primary_keys: vec!["id".to_string()],
        base_url: None,
    };
    let mut engine = build_engine(&tmp, &cfg).await;

    engine.start_cycle().await.unwrap();
    let doc = engine.next_document().unwrap();
    assert_eq!(
        doc.first_value(prop::CONTENT),
        Some(&PropertyValue::Binary(b"BINARY PAYLOAD".to_vec()))
    );
    assert_eq!(
        doc.first_value("label").and_then(PropertyValue::as_str),
        Some("scan")
    );
    assert!(doc.find_property("id").is_none());
}
