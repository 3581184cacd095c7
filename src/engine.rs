//! Catalog Engine - one handle over ingestion, schema, filtering and grouping
//!
//! Front ends (HTTP server, CLI) only talk to this type. The store handle is
//! injected at construction; nothing here is global.

use crate::error::{CatalogError, Result};
use crate::filter::{FilterStrategy, FixedSchema, QueryParams};
use crate::grouping::{take_group_key, GroupedResult, GroupingEngine, GROUP_BY_PARAM};
use crate::identifier::IdentifierGenerator;
use crate::ingest::{IngestionPipeline, IngestionReport};
use crate::record::Record;
use crate::schema::{InferredSchema, SchemaInferrer};
use crate::store::RecordStore;
use std::path::Path;
use std::sync::Arc;

/// Grouping field of the product catalog view when the caller names none.
pub const DEFAULT_CATALOG_GROUP: &str = "option_code";

pub struct CatalogEngine {
    store: Arc<dyn RecordStore>,
    pipeline: IngestionPipeline,
    inferrer: SchemaInferrer,
    grouping: GroupingEngine,
    catalog: FixedSchema,
}

impl CatalogEngine {
    pub fn new(store: Arc<dyn RecordStore>, generator: IdentifierGenerator) -> Self {
        Self::with_catalog(store, generator, FixedSchema::product_catalog())
    }

    pub fn with_catalog(
        store: Arc<dyn RecordStore>,
        generator: IdentifierGenerator,
        catalog: FixedSchema,
    ) -> Self {
        Self {
            pipeline: IngestionPipeline::new(Arc::clone(&store), generator),
            inferrer: SchemaInferrer::new(Arc::clone(&store)),
            grouping: GroupingEngine::new(Arc::clone(&store)),
            store,
            catalog,
        }
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    /// Ingest an uploaded CSV file; the file is consumed.
    pub async fn ingest(&self, upload: impl AsRef<Path>) -> Result<IngestionReport> {
        self.pipeline.ingest(upload).await
    }

    pub async fn fetch_all(&self) -> Result<Vec<Record>> {
        let records = self.store.find_all().await?;
        if records.is_empty() {
            return Err(CatalogError::NoRecords);
        }
        Ok(records)
    }

    /// Fresh schema snapshot; never cached.
    pub async fn schema(&self) -> Result<InferredSchema> {
        self.inferrer.infer().await
    }

    /// Filters validated against the inferred schema.
    pub async fn query(&self, params: &QueryParams) -> Result<Vec<Record>> {
        let schema = self.inferrer.infer().await?;
        self.fetch_matching(FilterStrategy::SchemaValidated(&schema), params)
            .await
    }

    /// Filters validated against the fixed product catalog.
    pub async fn query_catalog(&self, params: &QueryParams) -> Result<Vec<Record>> {
        self.fetch_matching(FilterStrategy::EnumValidated(&self.catalog), params)
            .await
    }

    /// Requires `groupBy`; every other parameter is a schema-validated filter.
    pub async fn grouped(&self, params: &QueryParams) -> Result<GroupedResult> {
        // reject before scanning the store
        take_group_key(params)?;
        let schema = self.inferrer.infer().await?;
        self.grouping.group(&schema, params).await
    }

    /// Product catalog view: enum-validated filters, grouped by `groupBy` or
    /// `option_code`.
    pub async fn grouped_catalog(&self, params: &QueryParams) -> Result<GroupedResult> {
        let mut filters = params.clone();
        let field = filters
            .remove(GROUP_BY_PARAM)
            .filter(|f| !f.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_CATALOG_GROUP.to_string());
        self.grouping
            .group_with(FilterStrategy::EnumValidated(&self.catalog), &filters, field.trim())
            .await
    }

    async fn fetch_matching(
        &self,
        strategy: FilterStrategy<'_>,
        params: &QueryParams,
    ) -> Result<Vec<Record>> {
        let filter = strategy.compile(params);
        let records = self.store.find(&filter).await?;
        if records.is_empty() {
            return Err(CatalogError::NoMatches);
        }
        Ok(records)
    }
}
