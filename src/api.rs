//! API layer - request routing and JSON envelopes shared by the front ends
//!
//! Transport-free: the server binary parses HTTP and hands an `ApiRequest`
//! here; the CLI builds the same envelopes directly.

use crate::engine::CatalogEngine;
use crate::error::{CatalogError, Result};
use crate::filter::QueryParams;
use crate::grouping::GroupedResult;
use crate::ingest::IngestionReport;
use crate::record::Record;
use crate::schema::InferredSchema;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
}

impl ApiResponse {
    pub fn ok(body: Value) -> Self {
        Self { status: 200, body }
    }

    pub fn from_error(err: &CatalogError) -> Self {
        Self {
            status: err.status_code(),
            body: json!({ "success": false, "message": err.to_string() }),
        }
    }

    pub fn not_found_route(path: &str) -> Self {
        Self {
            status: 404,
            body: json!({ "success": false, "message": format!("No route for {}", path) }),
        }
    }

    pub fn status_text(&self) -> &'static str {
        match self.status {
            200 => "OK",
            400 => "Bad Request",
            404 => "Not Found",
            413 => "Payload Too Large",
            _ => "Internal Server Error",
        }
    }
}

/// Map an engine result onto a response, logging server-side failures.
pub fn respond<T>(result: Result<T>, render: impl FnOnce(T) -> Value) -> ApiResponse {
    match result {
        Ok(value) => ApiResponse::ok(render(value)),
        Err(e) => {
            if e.status_code() >= 500 {
                error!("Request failed: {}", e);
            }
            ApiResponse::from_error(&e)
        }
    }
}

pub fn ingested_body(report: IngestionReport) -> Value {
    json!({
        "success": true,
        "message": format!("Successfully imported {} rows.", report.inserted_count),
        "insertedCount": report.inserted_count,
        "runId": report.run_id,
    })
}

pub fn records_body(records: Vec<Record>) -> Value {
    json!({ "success": true, "data": records })
}

pub fn schema_body(schema: InferredSchema) -> Value {
    json!({
        "success": true,
        "schema": schema.fields,
        "uniqueValues": schema.value_counts,
    })
}

pub fn grouped_body(groups: GroupedResult) -> Value {
    json!({ "success": true, "groupedData": groups })
}

/// Decode an `application/x-www-form-urlencoded` query string. The first
/// occurrence of a repeated key wins.
pub fn parse_query(query: &str) -> QueryParams {
    let mut params = QueryParams::new();
    for (key, value) in form_urlencoded::parse(query.as_bytes()) {
        params.entry(key.into_owned()).or_insert_with(|| value.into_owned());
    }
    params
}

#[derive(Debug, Clone, Default)]
pub struct ApiRequest {
    pub method: String,
    pub path: String,
    pub query: QueryParams,
    pub body: Vec<u8>,
}

/// Routes requests to the engine
pub struct ApiRouter {
    engine: Arc<CatalogEngine>,
    upload_dir: PathBuf,
}

impl ApiRouter {
    pub fn new(engine: Arc<CatalogEngine>, upload_dir: impl Into<PathBuf>) -> Self {
        Self {
            engine,
            upload_dir: upload_dir.into(),
        }
    }

    pub async fn handle(&self, request: &ApiRequest) -> ApiResponse {
        match (request.method.as_str(), request.path.as_str()) {
            ("GET", "/health") => ApiResponse::ok(json!({ "status": "ok", "service": "catalog-lens" })),
            ("POST", "/dataupload") => self.upload(&request.body).await,
            ("GET", "/get-all-products") => respond(self.engine.fetch_all().await, records_body),
            ("GET", "/schema") => respond(self.engine.schema().await, schema_body),
            ("GET", "/products") => respond(self.engine.query(&request.query).await, records_body),
            ("GET", "/catalog-products") => {
                respond(self.engine.query_catalog(&request.query).await, records_body)
            }
            ("GET", "/grouped") => respond(self.engine.grouped(&request.query).await, grouped_body),
            ("GET", "/grouped-products") => {
                respond(self.engine.grouped_catalog(&request.query).await, grouped_body)
            }
            (_, path) => ApiResponse::not_found_route(path),
        }
    }

    /// Persist the raw CSV body as a transient upload and ingest it. The
    /// pipeline removes the file afterwards.
    async fn upload(&self, body: &[u8]) -> ApiResponse {
        if body.is_empty() {
            return ApiResponse::from_error(&CatalogError::Input("no file uploaded".to_string()));
        }
        if let Err(e) = tokio::fs::create_dir_all(&self.upload_dir).await {
            return ApiResponse::from_error(&CatalogError::from(e));
        }

        let path = self.upload_dir.join(format!("{}.csv", Uuid::new_v4().simple()));
        if let Err(e) = tokio::fs::write(&path, body).await {
            return ApiResponse::from_error(&CatalogError::from(e));
        }
        info!("Stored upload of {} bytes at {}", body.len(), path.display());

        respond(self.engine.ingest(&path).await, ingested_body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_query_decodes() {
        let params = parse_query("Sleeve=Half%20Sleeve&Brick=T-shirt&MRP=799&Brick=Jeans&q=a+b");
        assert_eq!(params.get("Sleeve").map(String::as_str), Some("Half Sleeve"));
        assert_eq!(params.get("Brick").map(String::as_str), Some("T-shirt"));
        assert_eq!(params.get("MRP").map(String::as_str), Some("799"));
        assert_eq!(params.get("q").map(String::as_str), Some("a b"));
    }

    #[test]
    fn test_error_envelope() {
        let resp = ApiResponse::from_error(&CatalogError::MissingGroupKey("groupBy".into()));
        assert_eq!(resp.status, 400);
        assert_eq!(resp.status_text(), "Bad Request");
        assert_eq!(resp.body["success"], json!(false));
    }
}
