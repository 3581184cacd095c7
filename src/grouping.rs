//! Grouping Engine - filtered fetch partitioned by one field

use crate::error::{CatalogError, Result};
use crate::filter::{FilterStrategy, QueryParams};
use crate::record::Record;
use crate::schema::InferredSchema;
use crate::store::RecordStore;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Request parameter naming the grouping field.
pub const GROUP_BY_PARAM: &str = "groupBy";

/// group key -> members in store scan order
pub type GroupedResult = BTreeMap<String, Vec<Record>>;

/// Bucket records by the string form of `field`. Records without a value
/// for it land in no bucket.
pub fn partition(records: Vec<Record>, field: &str) -> GroupedResult {
    let mut groups = GroupedResult::new();
    for record in records {
        let key = match record.get(field).and_then(|v| v.group_key()) {
            Some(key) => key,
            None => continue,
        };
        groups.entry(key).or_default().push(record);
    }
    groups
}

/// Split the grouping field out of the request, leaving only filters.
pub fn take_group_key(params: &QueryParams) -> Result<(String, QueryParams)> {
    let field = params
        .get(GROUP_BY_PARAM)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| CatalogError::MissingGroupKey(GROUP_BY_PARAM.to_string()))?
        .to_string();

    let mut filters = params.clone();
    filters.remove(GROUP_BY_PARAM);
    Ok((field, filters))
}

pub struct GroupingEngine {
    store: Arc<dyn RecordStore>,
}

impl GroupingEngine {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// `groupBy` picks the field; every other parameter is a schema-validated
    /// filter.
    pub async fn group(&self, schema: &InferredSchema, params: &QueryParams) -> Result<GroupedResult> {
        let (field, filters) = take_group_key(params)?;
        self.group_with(FilterStrategy::SchemaValidated(schema), &filters, &field)
            .await
    }

    pub async fn group_with(
        &self,
        strategy: FilterStrategy<'_>,
        filters: &QueryParams,
        field: &str,
    ) -> Result<GroupedResult> {
        let filter = strategy.compile(filters);
        let records = self.store.find(&filter).await?;
        let fetched = records.len();
        let groups = partition(records, field);
        debug!(
            "Grouped {} records into {} buckets by {}",
            fetched,
            groups.len(),
            field
        );
        Ok(groups)
    }
}
