pub mod api;
pub mod config;
pub mod csv_source;
pub mod engine;
pub mod error;
pub mod filter;
pub mod grouping;
pub mod identifier;
pub mod ingest;
pub mod normalizer;
pub mod record;
pub mod schema;
pub mod store;

pub use engine::CatalogEngine;
pub use error::{CatalogError, ErrorKind, Result};
pub use filter::{FilterStrategy, FixedSchema, QueryFilter, QueryParams};
pub use grouping::GroupedResult;
pub use record::{FieldValue, Record, EAN_CODE};
pub use schema::InferredSchema;
pub use store::{MemoryStore, RecordStore, SqliteStore};
