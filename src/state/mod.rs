pub mod memory;
pub mod sled_store;

pub use memory::InMemoryStore;
pub use sled_store::SledStore;

use crate::error::Result;
use crate::models::{PredictionRecord, RiskBand};
use async_trait::async_trait;
use uuid::Uuid;

/// Filter for listing persisted predictions
#[derive(Debug, Clone, Default)]
pub struct PredictionFilter {
    pub risk_band: Option<RiskBand>,
    pub limit: Option<usize>,
}

/// Append-only prediction audit log. Records are never updated or
/// deleted; listing returns newest first.
#[async_trait]
pub trait PredictionStore: Send + Sync {
    /// Append a prediction record
    async fn append(&self, record: &PredictionRecord) -> Result<()>;

    /// Get a single record by ID
    async fn get(&self, id: &Uuid) -> Result<Option<PredictionRecord>>;

    /// List records newest first, optionally filtered
    async fn list(&self, filter: &PredictionFilter) -> Result<Vec<PredictionRecord>>;

    /// Total number of persisted records
    async fn count(&self) -> Result<usize>;
}
