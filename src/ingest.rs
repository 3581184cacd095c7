//! Ingestion Pipeline - uploaded CSV file into the record store
//!
//! parse -> normalize row by row -> one bulk insert. The uploaded file is
//! removed on every exit path. Identifier assignment is sequential so rows of
//! one batch never race each other; races with concurrent batches surface as
//! insert-time conflicts and are resolved by regenerating the clashing
//! identifier.

use crate::csv_source::read_rows;
use crate::error::{CatalogError, Result};
use crate::identifier::IdentifierGenerator;
use crate::normalizer::{BatchProbe, RecordNormalizer};
use crate::record::{RawRow, Record};
use crate::store::RecordStore;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Deletes the uploaded file when dropped.
pub struct UploadGuard {
    path: PathBuf,
}

impl UploadGuard {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for UploadGuard {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove upload {}: {}", self.path.display(), e),
        }
    }
}

/// Outcome of one successful ingestion run
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IngestionReport {
    pub run_id: String,

    /// Rows inserted into the store
    pub inserted_count: usize,

    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

pub struct IngestionPipeline {
    store: Arc<dyn RecordStore>,
    normalizer: RecordNormalizer,
}

impl IngestionPipeline {
    pub fn new(store: Arc<dyn RecordStore>, generator: IdentifierGenerator) -> Self {
        Self {
            store,
            normalizer: RecordNormalizer::new(generator),
        }
    }

    /// Ingest the CSV file at `upload`. The file is deleted afterwards whether
    /// or not ingestion succeeded.
    pub async fn ingest(&self, upload: impl AsRef<Path>) -> Result<IngestionReport> {
        let guard = UploadGuard::new(upload.as_ref());
        let run_id = Uuid::new_v4().to_string();
        let started_at = Utc::now();
        info!("Ingestion {} started for {}", run_id, guard.path().display());

        let path = guard.path().to_path_buf();
        let rows = tokio::task::spawn_blocking(move || read_rows(&path))
            .await
            .map_err(|e| CatalogError::Store(format!("CSV parse task failed: {}", e)))??;

        let inserted_count = self.ingest_rows(rows).await?;
        let finished_at = Utc::now();
        info!("Ingestion {} inserted {} records", run_id, inserted_count);

        Ok(IngestionReport {
            run_id,
            inserted_count,
            started_at,
            finished_at,
        })
    }

    /// Normalize and insert already-parsed rows.
    pub async fn ingest_rows(&self, rows: Vec<RawRow>) -> Result<usize> {
        if rows.is_empty() {
            return Err(CatalogError::EmptyInput);
        }

        let mut assigned = HashSet::with_capacity(rows.len());
        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let record = {
                let probe = BatchProbe::new(self.store.as_ref(), &assigned);
                self.normalizer.normalize(row, &probe).await?
            };
            if let Some(id) = record.identifier() {
                assigned.insert(id.to_string());
            }
            records.push(record);
        }

        self.insert_resolving_conflicts(records, assigned).await
    }

    async fn insert_resolving_conflicts(
        &self,
        mut records: Vec<Record>,
        mut assigned: HashSet<String>,
    ) -> Result<usize> {
        let generator = self.normalizer.generator();
        let mut conflicts = 0usize;

        loop {
            let id = match self.store.insert_many(records.clone()).await {
                Err(CatalogError::DuplicateIdentifier(id)) => id,
                other => return other,
            };

            conflicts += 1;
            if conflicts > generator.retry_cap() {
                return Err(CatalogError::IdentifierExhaustion(generator.retry_cap()));
            }
            warn!("Identifier {} was claimed concurrently, regenerating", id);

            let fresh = {
                let probe = BatchProbe::new(self.store.as_ref(), &assigned);
                generator.ensure_unique(generator.generate(), &probe).await?
            };
            let record = records
                .iter_mut()
                .find(|r| r.identifier() == Some(id.as_str()))
                .ok_or_else(|| CatalogError::DuplicateIdentifier(id.clone()))?;
            record.set_identifier(fresh.clone());
            assigned.insert(fresh);
        }
    }
}
