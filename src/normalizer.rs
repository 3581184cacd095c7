//! Record Normalizer - raw CSV row to store-ready record
//!
//! Only `EAN_code` is touched. Every other column, expected or not, is passed
//! through as text.

use crate::error::Result;
use crate::identifier::{IdentifierGenerator, IdentifierProbe};
use crate::record::{RawRow, Record};
use crate::store::RecordStore;
use async_trait::async_trait;
use std::collections::HashSet;
use tracing::debug;

/// Treats an identifier as taken when the store holds it or an earlier row of
/// the same batch was assigned it.
pub struct BatchProbe<'a> {
    store: &'a dyn RecordStore,
    assigned: &'a HashSet<String>,
}

impl<'a> BatchProbe<'a> {
    pub fn new(store: &'a dyn RecordStore, assigned: &'a HashSet<String>) -> Self {
        Self { store, assigned }
    }
}

#[async_trait]
impl IdentifierProbe for BatchProbe<'_> {
    async fn is_taken(&self, identifier: &str) -> Result<bool> {
        if self.assigned.contains(identifier) {
            return Ok(true);
        }
        self.store.contains_identifier(identifier).await
    }
}

#[derive(Debug, Clone, Default)]
pub struct RecordNormalizer {
    generator: IdentifierGenerator,
}

impl RecordNormalizer {
    pub fn new(generator: IdentifierGenerator) -> Self {
        Self { generator }
    }

    pub fn generator(&self) -> &IdentifierGenerator {
        &self.generator
    }

    /// Keep the row's own non-blank `EAN_code`, otherwise generate one, then
    /// regenerate while the probe reports the value taken.
    pub async fn normalize(&self, row: RawRow, probe: &dyn IdentifierProbe) -> Result<Record> {
        let mut record = Record::from_raw(row);

        let candidate = match record.identifier() {
            Some(id) if !id.trim().is_empty() => id.to_string(),
            _ => self.generator.generate(),
        };
        let identifier = self.generator.ensure_unique(candidate.clone(), probe).await?;
        if identifier != candidate {
            debug!("Replaced taken identifier {} with {}", candidate, identifier);
        }

        record.set_identifier(identifier);
        Ok(record)
    }
}
