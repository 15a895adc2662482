use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::Result;
use crate::models::PredictionRecord;
use crate::state::{PredictionFilter, PredictionStore};

/// In-memory prediction log for tests and local development
#[derive(Clone, Default)]
pub struct InMemoryStore {
    records: Arc<DashMap<Uuid, PredictionRecord>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PredictionStore for InMemoryStore {
    async fn append(&self, record: &PredictionRecord) -> Result<()> {
        self.records.insert(record.id, record.clone());
        tracing::debug!(prediction_id = %record.id, "Prediction appended");
        Ok(())
    }

    async fn get(&self, id: &Uuid) -> Result<Option<PredictionRecord>> {
        Ok(self.records.get(id).map(|entry| entry.clone()))
    }

    async fn list(&self, filter: &PredictionFilter) -> Result<Vec<PredictionRecord>> {
        let mut records: Vec<PredictionRecord> = self
            .records
            .iter()
            .map(|entry| entry.value().clone())
            .filter(|record| {
                filter
                    .risk_band
                    .map_or(true, |band| record.risk_band == band)
            })
            .collect();

        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        if let Some(limit) = filter.limit {
            records.truncate(limit);
        }
        Ok(records)
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.records.len())
    }
}
