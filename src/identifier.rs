//! Identifier Generator - short random record keys with store-backed retry

use crate::error::{CatalogError, Result};
use async_trait::async_trait;
use tracing::debug;
use uuid::Uuid;

/// Length of a generated `EAN_code`.
pub const IDENTIFIER_LEN: usize = 12;

/// Answers "is this identifier already in use?". Each call may be a store
/// round trip.
#[async_trait]
pub trait IdentifierProbe: Send + Sync {
    async fn is_taken(&self, identifier: &str) -> Result<bool>;
}

#[derive(Debug, Clone)]
pub struct IdentifierGenerator {
    retry_cap: usize,
}

impl IdentifierGenerator {
    pub const DEFAULT_RETRY_CAP: usize = 1000;

    pub fn new() -> Self {
        Self::with_retry_cap(Self::DEFAULT_RETRY_CAP)
    }

    pub fn with_retry_cap(retry_cap: usize) -> Self {
        Self { retry_cap }
    }

    pub fn retry_cap(&self) -> usize {
        self.retry_cap
    }

    /// Fresh 12-character identifier from a v4 UUID, hyphens stripped.
    pub fn generate(&self) -> String {
        let mut id = Uuid::new_v4().simple().to_string();
        id.truncate(IDENTIFIER_LEN);
        id
    }

    /// Regenerate `candidate` until the probe reports it free. Fails with
    /// `IdentifierExhaustion` once more than `retry_cap` regenerations were
    /// needed.
    pub async fn ensure_unique(
        &self,
        candidate: String,
        probe: &dyn IdentifierProbe,
    ) -> Result<String> {
        let mut candidate = candidate;
        let mut attempts = 0usize;

        while probe.is_taken(&candidate).await? {
            attempts += 1;
            if attempts > self.retry_cap {
                return Err(CatalogError::IdentifierExhaustion(self.retry_cap));
            }
            debug!("Identifier {} already taken, regenerating (attempt {})", candidate, attempts);
            candidate = self.generate();
        }

        Ok(candidate)
    }
}

impl Default for IdentifierGenerator {
    fn default() -> Self {
        Self::new()
    }
}
