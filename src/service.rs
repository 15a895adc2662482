use chrono::{DateTime, Utc};
use ndarray::Array2;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use crate::error::{AppError, Result};
use crate::models::{Gender, PredictionRecord, RawFeatures, RiskTarget, TargetPrediction};
use crate::pipeline::metrics::MetricReport;
use crate::pipeline::transform;
use crate::pipeline::ModelBundle;
use crate::state::{PredictionFilter, PredictionStore};

/// A prediction request before validation. Every feature field is
/// optional at the edge; the service decides what is missing.
#[derive(Debug, Clone, Default)]
pub struct PredictionInput {
    pub gender: Option<Gender>,
    pub parental_support: Option<String>,
    pub attendance_rate: Option<f64>,
    pub study_hours_per_week: Option<f64>,
    pub previous_grade: Option<f64>,
    pub final_grade: Option<f64>,
    pub extracurricular_activities: Option<f64>,
    pub requested_by: Option<String>,
}

/// Summary of one loaded model, surfaced by the models endpoint
#[derive(Debug, Clone, Serialize)]
pub struct ModelInfo {
    pub target: RiskTarget,
    pub preset: String,
    pub trained_at: DateTime<Utc>,
    pub n_trees: usize,
    pub feature_order: Vec<String>,
    pub metrics: MetricReport,
}

/// Serves predictions from the two persisted bundles and appends every
/// successful inference to the prediction log.
#[derive(Clone)]
pub struct InferenceService {
    dropout: Arc<ModelBundle>,
    underperform: Arc<ModelBundle>,
    store: Arc<dyn PredictionStore>,
}

impl InferenceService {
    pub fn new(
        dropout: ModelBundle,
        underperform: ModelBundle,
        store: Arc<dyn PredictionStore>,
    ) -> Self {
        Self {
            dropout: Arc::new(dropout),
            underperform: Arc::new(underperform),
            store,
        }
    }

    /// Load both target bundles from the models directory
    pub fn load(models_dir: &Path, store: Arc<dyn PredictionStore>) -> Result<Self> {
        let dropout = ModelBundle::load(models_dir, RiskTarget::Dropout)?;
        let underperform = ModelBundle::load(models_dir, RiskTarget::Underperform)?;

        info!(
            models_dir = %models_dir.display(),
            dropout_trained_at = %dropout.trained_at,
            underperform_trained_at = %underperform.trained_at,
            "Loaded model bundles"
        );

        Ok(Self::new(dropout, underperform, store))
    }

    /// Run both target models over one input and persist the outcome.
    /// The record is appended only after both predictions succeed, so
    /// the log never carries half a result.
    pub async fn predict(&self, input: PredictionInput) -> Result<PredictionRecord> {
        let requested_by = input.requested_by.clone();
        let features = self.resolve_features(input)?;

        let dropout = Self::predict_one(&self.dropout, &features)?;
        let underperform = Self::predict_one(&self.underperform, &features)?;

        let record = PredictionRecord::new(features, dropout, underperform, requested_by);
        self.store.append(&record).await?;

        info!(
            prediction_id = %record.id,
            risk_band = ?record.risk_band,
            "Prediction served"
        );
        Ok(record)
    }

    /// Recent predictions from the log
    pub async fn recent(&self, filter: &PredictionFilter) -> Result<Vec<PredictionRecord>> {
        self.store.list(filter).await
    }

    /// One persisted prediction by ID
    pub async fn prediction(&self, id: &uuid::Uuid) -> Result<PredictionRecord> {
        self.store
            .get(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("prediction {id} not found")))
    }

    pub async fn prediction_count(&self) -> Result<usize> {
        self.store.count().await
    }

    /// Summaries of the loaded models
    pub fn model_info(&self) -> Vec<ModelInfo> {
        [&self.dropout, &self.underperform]
            .into_iter()
            .map(|bundle| ModelInfo {
                target: bundle.target,
                preset: bundle.preset.clone(),
                trained_at: bundle.trained_at,
                n_trees: bundle.forest.n_trees(),
                feature_order: bundle.feature_order.clone(),
                metrics: bundle.report.clone(),
            })
            .collect()
    }

    /// Reject the request before any transform runs if a required field
    /// is absent, naming the field
    fn resolve_features(&self, input: PredictionInput) -> Result<RawFeatures> {
        let gender = input
            .gender
            .ok_or_else(|| AppError::IncompleteInput("gender".to_string()))?;
        let parental_support = input
            .parental_support
            .ok_or_else(|| AppError::IncompleteInput("parental_support".to_string()))?;
        let attendance_rate = input
            .attendance_rate
            .ok_or_else(|| AppError::IncompleteInput("attendance_rate".to_string()))?;
        let study_hours_per_week = input
            .study_hours_per_week
            .ok_or_else(|| AppError::IncompleteInput("study_hours_per_week".to_string()))?;
        let previous_grade = input
            .previous_grade
            .ok_or_else(|| AppError::IncompleteInput("previous_grade".to_string()))?;
        let final_grade = input
            .final_grade
            .ok_or_else(|| AppError::IncompleteInput("final_grade".to_string()))?;

        if self.dropout.state.include_extracurricular()
            && input.extracurricular_activities.is_none()
        {
            return Err(AppError::IncompleteInput(
                "extracurricular_activities".to_string(),
            ));
        }

        Ok(RawFeatures {
            gender,
            parental_support,
            attendance_rate,
            study_hours_per_week,
            previous_grade,
            final_grade,
            extracurricular_activities: input.extracurricular_activities,
        })
    }

    fn predict_one(bundle: &ModelBundle, features: &RawFeatures) -> Result<TargetPrediction> {
        let row = transform::transform_row(features, &bundle.state)?;
        let matrix = Array2::from_shape_vec((1, row.len()), row)
            .map_err(|e| AppError::Internal(format!("failed to shape feature row: {e}")))?;

        let probability = bundle.forest.predict_proba(&matrix)?[0];
        Ok(TargetPrediction {
            label: u8::from(probability > 0.5),
            probability,
        })
    }
}
