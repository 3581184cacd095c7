//! SQLite-backed record store
//!
//! Records are kept as JSON bodies next to an indexed, UNIQUE `ean_code`
//! column. Predicates are evaluated on decoded records; only identifier
//! lookups go through the index.

use super::{missing_identifier, RecordStore};
use crate::error::{CatalogError, Result};
use crate::filter::QueryFilter;
use crate::record::Record;
use async_trait::async_trait;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::info;

pub struct SqliteStore {
    /// None for in-memory databases
    path: Option<PathBuf>,

    db: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open or create the database file, creating parent directories.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let db = Connection::open(&path)?;
        Self::init_schema(&db)?;
        info!("Opened record store at {}", path.display());

        Ok(Self {
            path: Some(path),
            db: Arc::new(Mutex::new(db)),
        })
    }

    pub fn in_memory() -> Result<Self> {
        let db = Connection::open_in_memory()?;
        Self::init_schema(&db)?;
        Ok(Self {
            path: None,
            db: Arc::new(Mutex::new(db)),
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn init_schema(db: &Connection) -> Result<()> {
        db.execute_batch(
            "CREATE TABLE IF NOT EXISTS records (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                ean_code TEXT NOT NULL UNIQUE,
                body TEXT NOT NULL
            );",
        )?;
        Ok(())
    }

    /// Run blocking SQLite work off the async runtime.
    async fn with_db<T, F>(&self, work: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || {
            let mut conn = db
                .lock()
                .map_err(|_| CatalogError::Store("record store lock poisoned".to_string()))?;
            work(&mut conn)
        })
        .await
        .map_err(|e| CatalogError::Store(format!("record store task failed: {}", e)))?
    }
}

fn scan(conn: &Connection, filter: &QueryFilter) -> Result<Vec<Record>> {
    let mut stmt = conn.prepare("SELECT seq, body FROM records ORDER BY seq")?;
    let rows = stmt.query_map([], |row| {
        Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
    })?;

    let mut out = Vec::new();
    for row in rows {
        let (seq, body) = row?;
        let mut record: Record = serde_json::from_str(&body)?;
        record.set_seq(seq as u64);
        if filter.matches(&record) {
            out.push(record);
        }
    }
    Ok(out)
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(err, rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation)
}

#[async_trait]
impl RecordStore for SqliteStore {
    async fn insert_many(&self, records: Vec<Record>) -> Result<usize> {
        self.with_db(move |conn| {
            let tx = conn.transaction()?;
            let count = records.len();
            {
                let mut stmt = tx.prepare("INSERT INTO records (ean_code, body) VALUES (?1, ?2)")?;
                for record in records {
                    let ean = record.identifier().ok_or_else(missing_identifier)?.to_string();
                    let body = serde_json::to_string(record.fields())?;
                    if let Err(e) = stmt.execute(params![ean, body]) {
                        // dropping the transaction rolls back the batch
                        return Err(if is_unique_violation(&e) {
                            CatalogError::DuplicateIdentifier(ean)
                        } else {
                            e.into()
                        });
                    }
                }
            }
            tx.commit()?;
            Ok(count)
        })
        .await
    }

    async fn find(&self, filter: &QueryFilter) -> Result<Vec<Record>> {
        let filter = filter.clone();
        self.with_db(move |conn| scan(conn, &filter)).await
    }

    async fn contains_identifier(&self, identifier: &str) -> Result<bool> {
        let identifier = identifier.to_string();
        self.with_db(move |conn| {
            let hit = conn
                .query_row(
                    "SELECT 1 FROM records WHERE ean_code = ?1 LIMIT 1",
                    params![identifier],
                    |_| Ok(()),
                )
                .optional()?;
            Ok(hit.is_some())
        })
        .await
    }
}
