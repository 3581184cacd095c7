//! Schema Inference - observed field set and value frequencies over the store
//!
//! The schema is never stored. Every call scans the current records, so a
//! result must not be reused once another ingestion has run.

use crate::error::{CatalogError, Result};
use crate::record::Record;
use crate::store::RecordStore;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::debug;

/// Snapshot of what the store currently holds
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InferredSchema {
    /// Every non-internal field name seen on any record.
    pub fields: BTreeSet<String>,

    /// field -> stringified value -> number of records holding it.
    pub value_counts: BTreeMap<String, BTreeMap<String, u64>>,

    /// Records scanned to build this snapshot.
    #[serde(skip)]
    pub record_count: usize,
}

impl InferredSchema {
    /// Pure inference over an in-memory record set.
    pub fn from_records<'a, I>(records: I) -> Self
    where
        I: IntoIterator<Item = &'a Record>,
    {
        let mut schema = InferredSchema::default();
        for record in records {
            schema.record_count += 1;
            for (field, value) in record.user_fields() {
                schema.fields.insert(field.clone());
                *schema
                    .value_counts
                    .entry(field.clone())
                    .or_default()
                    .entry(value.stringify())
                    .or_insert(0) += 1;
            }
        }
        schema
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains(field)
    }

    pub fn value_counts_for(&self, field: &str) -> Option<&BTreeMap<String, u64>> {
        self.value_counts.get(field)
    }
}

/// Scans the store on demand
pub struct SchemaInferrer {
    store: Arc<dyn RecordStore>,
}

impl SchemaInferrer {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Fails with `NoRecords` on an empty store; callers treat that as
    /// "no schema yet".
    pub async fn infer(&self) -> Result<InferredSchema> {
        let records = self.store.find_all().await?;
        if records.is_empty() {
            return Err(CatalogError::NoRecords);
        }
        let schema = InferredSchema::from_records(&records);
        debug!(
            "Inferred {} fields from {} records",
            schema.fields.len(),
            schema.record_count
        );
        Ok(schema)
    }
}
