use async_trait::async_trait;
use sled::Db;
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::PredictionRecord;
use crate::state::{PredictionFilter, PredictionStore};

/// Persistent prediction log backed by a Sled embedded database.
///
/// Records are keyed by creation time so a reverse scan yields newest
/// first; a secondary tree maps record IDs back to log keys.
#[derive(Clone)]
pub struct SledStore {
    _db: Arc<Db>,
    log_tree: sled::Tree,
    id_tree: sled::Tree,
}

impl SledStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let db = sled::open(&path)
            .map_err(|e| AppError::Storage(format!("failed to open sled database: {e}")))?;

        let log_tree = db
            .open_tree("predictions")
            .map_err(|e| AppError::Storage(format!("failed to open predictions tree: {e}")))?;
        let id_tree = db
            .open_tree("prediction_ids")
            .map_err(|e| AppError::Storage(format!("failed to open id index tree: {e}")))?;

        tracing::info!(path = %path.as_ref().display(), "Initialized sled prediction store");

        Ok(Self {
            _db: Arc::new(db),
            log_tree,
            id_tree,
        })
    }

    /// Time-ordered log key: millisecond timestamp then record ID as a
    /// tie-breaker
    fn log_key(record: &PredictionRecord) -> Vec<u8> {
        let mut key = Vec::with_capacity(8 + 16);
        let millis = record.created_at.timestamp_millis().max(0) as u64;
        key.extend_from_slice(&millis.to_be_bytes());
        key.extend_from_slice(record.id.as_bytes());
        key
    }

    fn serialize(record: &PredictionRecord) -> Result<Vec<u8>> {
        bincode::serialize(record)
            .map_err(|e| AppError::Storage(format!("failed to serialize prediction: {e}")))
    }

    fn deserialize(bytes: &[u8]) -> Result<PredictionRecord> {
        bincode::deserialize(bytes)
            .map_err(|e| AppError::Storage(format!("failed to deserialize prediction: {e}")))
    }
}

#[async_trait]
impl PredictionStore for SledStore {
    async fn append(&self, record: &PredictionRecord) -> Result<()> {
        let key = Self::log_key(record);
        let value = Self::serialize(record)?;

        self.log_tree
            .insert(&key, value)
            .map_err(|e| AppError::Storage(format!("failed to append prediction: {e}")))?;
        self.id_tree
            .insert(record.id.as_bytes(), key)
            .map_err(|e| AppError::Storage(format!("failed to index prediction: {e}")))?;

        tracing::debug!(prediction_id = %record.id, "Prediction appended");
        Ok(())
    }

    async fn get(&self, id: &Uuid) -> Result<Option<PredictionRecord>> {
        let Some(key) = self
            .id_tree
            .get(id.as_bytes())
            .map_err(|e| AppError::Storage(format!("failed to read id index: {e}")))?
        else {
            return Ok(None);
        };

        let Some(bytes) = self
            .log_tree
            .get(&key)
            .map_err(|e| AppError::Storage(format!("failed to read prediction: {e}")))?
        else {
            return Ok(None);
        };

        Ok(Some(Self::deserialize(&bytes)?))
    }

    async fn list(&self, filter: &PredictionFilter) -> Result<Vec<PredictionRecord>> {
        let limit = filter.limit.unwrap_or(usize::MAX);
        let mut records = Vec::new();

        for entry in self.log_tree.iter().rev() {
            let (_, bytes) =
                entry.map_err(|e| AppError::Storage(format!("failed to scan predictions: {e}")))?;
            let record = Self::deserialize(&bytes)?;

            if let Some(band) = filter.risk_band {
                if record.risk_band != band {
                    continue;
                }
            }

            records.push(record);
            if records.len() >= limit {
                break;
            }
        }

        Ok(records)
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.log_tree.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Gender, RawFeatures, RiskBand, TargetPrediction};

    fn record(dropout: u8, underperform: u8) -> PredictionRecord {
        PredictionRecord::new(
            RawFeatures {
                gender: Gender::Male,
                parental_support: "Medium".to_string(),
                attendance_rate: 70.0,
                study_hours_per_week: 10.0,
                previous_grade: 72.0,
                final_grade: 68.0,
                extracurricular_activities: Some(1.0),
            },
            TargetPrediction {
                label: dropout,
                probability: f64::from(dropout),
            },
            TargetPrediction {
                label: underperform,
                probability: f64::from(underperform),
            },
            None,
        )
    }

    #[tokio::test]
    async fn append_get_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = SledStore::new(dir.path()).unwrap();

        let record = record(1, 0);
        store.append(&record).await.unwrap();

        let loaded = store.get(&record.id).await.unwrap().unwrap();
        assert_eq!(loaded.id, record.id);
        assert_eq!(loaded.risk_band, RiskBand::MediumRisk);
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn list_is_newest_first_and_filterable() {
        let dir = tempfile::tempdir().unwrap();
        let store = SledStore::new(dir.path()).unwrap();

        let older = record(0, 0);
        let mut newer = record(1, 1);
        newer.created_at = older.created_at + chrono::Duration::seconds(5);
        store.append(&older).await.unwrap();
        store.append(&newer).await.unwrap();

        let all = store.list(&PredictionFilter::default()).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, newer.id);

        let high_only = store
            .list(&PredictionFilter {
                risk_band: Some(RiskBand::HighRisk),
                limit: None,
            })
            .await
            .unwrap();
        assert_eq!(high_only.len(), 1);
        assert_eq!(high_only[0].id, newer.id);
    }

    #[tokio::test]
    async fn records_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let record = record(1, 1);

        {
            let store = SledStore::new(dir.path()).unwrap();
            store.append(&record).await.unwrap();
        }

        let store = SledStore::new(dir.path()).unwrap();
        assert!(store.get(&record.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn missing_id_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = SledStore::new(dir.path()).unwrap();
        assert!(store.get(&Uuid::new_v4()).await.unwrap().is_none());
    }
}
