use super::{missing_identifier, RecordStore};
use crate::error::{CatalogError, Result};
use crate::filter::QueryFilter;
use crate::record::Record;
use async_trait::async_trait;
use std::collections::HashSet;
use tokio::sync::RwLock;

#[derive(Default)]
struct MemoryInner {
    records: Vec<Record>,
    identifiers: HashSet<String>,
    next_id: u64,
}

/// In-process record store. Scan order is insertion order.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<MemoryInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.records.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn insert_many(&self, records: Vec<Record>) -> Result<usize> {
        let mut inner = self.inner.write().await;

        // validate the whole batch before touching state
        let mut batch = HashSet::with_capacity(records.len());
        for record in &records {
            let id = record.identifier().ok_or_else(missing_identifier)?;
            if inner.identifiers.contains(id) || !batch.insert(id.to_string()) {
                return Err(CatalogError::DuplicateIdentifier(id.to_string()));
            }
        }

        let count = records.len();
        for mut record in records {
            inner.next_id += 1;
            record.set_seq(inner.next_id);
            inner.records.push(record);
        }
        inner.identifiers.extend(batch);
        Ok(count)
    }

    async fn find(&self, filter: &QueryFilter) -> Result<Vec<Record>> {
        let inner = self.inner.read().await;
        Ok(inner
            .records
            .iter()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect())
    }

    async fn contains_identifier(&self, identifier: &str) -> Result<bool> {
        Ok(self.inner.read().await.identifiers.contains(identifier))
    }
}
