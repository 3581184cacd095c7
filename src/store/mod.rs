//! Record Store - abstract document store the engine runs against
//!
//! Backends:
//! - MemoryStore: process-local, used by tests and ephemeral runs
//! - SqliteStore: file-backed, used by the server and CLI
//!
//! Both enforce `EAN_code` uniqueness at insert time and reject the whole
//! batch on a conflict.

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use crate::error::Result;
use crate::filter::QueryFilter;
use crate::record::Record;
use async_trait::async_trait;

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Insert all records or none. A record whose `EAN_code` is already stored
    /// (or repeated inside the batch) fails the batch with
    /// `DuplicateIdentifier`.
    async fn insert_many(&self, records: Vec<Record>) -> Result<usize>;

    /// Records matching `filter`, in scan order.
    async fn find(&self, filter: &QueryFilter) -> Result<Vec<Record>>;

    async fn find_all(&self) -> Result<Vec<Record>> {
        self.find(&QueryFilter::all()).await
    }

    async fn find_one(&self, filter: &QueryFilter) -> Result<Option<Record>> {
        Ok(self.find(filter).await?.into_iter().next())
    }

    async fn contains_identifier(&self, identifier: &str) -> Result<bool> {
        Ok(self
            .find_one(&QueryFilter::identifier(identifier))
            .await?
            .is_some())
    }
}

pub(crate) fn missing_identifier() -> crate::error::CatalogError {
    crate::error::CatalogError::Store("record has no EAN_code".to_string())
}
