//! Process configuration from the environment (and `.env`)

use crate::error::{CatalogError, Result};
use crate::identifier::IdentifierGenerator;
use std::path::PathBuf;
use std::str::FromStr;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// SQLite database holding the records
    pub database_path: PathBuf,

    /// Where the server parks uploads before ingestion
    pub upload_dir: PathBuf,

    pub bind_addr: String,

    /// Regenerations allowed per identifier before giving up
    pub identifier_retry_cap: usize,

    /// Largest request body the server accepts
    pub max_upload_bytes: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("data/catalog.db"),
            upload_dir: PathBuf::from("public/uploads"),
            bind_addr: "0.0.0.0:5000".to_string(),
            identifier_retry_cap: IdentifierGenerator::DEFAULT_RETRY_CAP,
            max_upload_bytes: 10 * 1024 * 1024,
        }
    }
}

impl AppConfig {
    /// Load `.env` if present, then read `CATALOG_*` variables over the
    /// defaults.
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(path) = lookup("CATALOG_DB_PATH") {
            config.database_path = PathBuf::from(path);
        }
        if let Some(dir) = lookup("CATALOG_UPLOAD_DIR") {
            config.upload_dir = PathBuf::from(dir);
        }
        if let Some(addr) = lookup("CATALOG_BIND_ADDR") {
            config.bind_addr = addr;
        }
        if let Some(raw) = lookup("CATALOG_ID_RETRY_CAP") {
            config.identifier_retry_cap = parse_var("CATALOG_ID_RETRY_CAP", &raw)?;
        }
        if let Some(raw) = lookup("CATALOG_MAX_UPLOAD_BYTES") {
            config.max_upload_bytes = parse_var("CATALOG_MAX_UPLOAD_BYTES", &raw)?;
        }

        Ok(config)
    }

    pub fn identifier_generator(&self) -> IdentifierGenerator {
        IdentifierGenerator::with_retry_cap(self.identifier_retry_cap)
    }
}

fn parse_var<T: FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.trim()
        .parse()
        .map_err(|_| CatalogError::Config(format!("{} must be a non-negative integer, got {:?}", key, raw)))
}

/// Install the fmt subscriber, honoring `RUST_LOG` (default `info`).
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:5000");
        assert_eq!(config.identifier_retry_cap, 1000);
        assert_eq!(config.upload_dir, PathBuf::from("public/uploads"));
    }

    #[test]
    fn test_overrides() {
        let config = AppConfig::from_lookup(lookup_from(&[
            ("CATALOG_DB_PATH", "/tmp/c.db"),
            ("CATALOG_ID_RETRY_CAP", " 25 "),
            ("CATALOG_MAX_UPLOAD_BYTES", "2048"),
        ]))
        .unwrap();
        assert_eq!(config.database_path, PathBuf::from("/tmp/c.db"));
        assert_eq!(config.identifier_generator().retry_cap(), 25);
        assert_eq!(config.max_upload_bytes, 2048);
    }

    #[test]
    fn test_bad_number_is_config_error() {
        let err = AppConfig::from_lookup(lookup_from(&[("CATALOG_ID_RETRY_CAP", "lots")])).unwrap_err();
        assert!(matches!(err, CatalogError::Config(_)));
    }
}
