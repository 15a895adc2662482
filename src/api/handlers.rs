use crate::api::AppState;
use crate::error::Result;
use crate::models::{Gender, PredictionRecord, RiskBand};
use crate::service::{ModelInfo, PredictionInput};
use crate::state::PredictionFilter;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Health check endpoint
pub async fn health_check() -> Result<Json<HealthResponse>> {
    Ok(Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    }))
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Score one student against both risk models
pub async fn create_prediction(
    State(state): State<AppState>,
    Json(request): Json<CreatePredictionRequest>,
) -> Result<(StatusCode, Json<PredictionResponse>)> {
    request.validate()?;

    let record = state
        .service
        .predict(PredictionInput {
            gender: request.gender,
            parental_support: request.parental_support,
            attendance_rate: request.attendance_rate,
            study_hours_per_week: request.study_hours_per_week,
            previous_grade: request.previous_grade,
            final_grade: request.final_grade,
            extracurricular_activities: request.extracurricular_activities,
            requested_by: request.requested_by,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(PredictionResponse::from(record))))
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreatePredictionRequest {
    pub gender: Option<Gender>,
    #[validate(length(min = 1))]
    pub parental_support: Option<String>,
    #[validate(range(min = 0.0, max = 100.0))]
    pub attendance_rate: Option<f64>,
    #[validate(range(min = 0.0, max = 168.0))]
    pub study_hours_per_week: Option<f64>,
    #[validate(range(min = 0.0, max = 100.0))]
    pub previous_grade: Option<f64>,
    #[validate(range(min = 0.0, max = 100.0))]
    pub final_grade: Option<f64>,
    #[validate(range(min = 0.0))]
    pub extracurricular_activities: Option<f64>,
    #[validate(email)]
    pub requested_by: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PredictionResponse {
    pub id: Uuid,
    pub dropout_risk: u8,
    pub dropout_probability: f64,
    pub underperform_risk: u8,
    pub underperform_probability: f64,
    pub risk_band: RiskBand,
    pub created_at: DateTime<Utc>,
}

impl From<PredictionRecord> for PredictionResponse {
    fn from(record: PredictionRecord) -> Self {
        Self {
            id: record.id,
            dropout_risk: record.dropout_risk,
            dropout_probability: record.dropout_probability,
            underperform_risk: record.underperform_risk,
            underperform_probability: record.underperform_probability,
            risk_band: record.risk_band,
            created_at: record.created_at,
        }
    }
}

/// List recent predictions, newest first
pub async fn list_predictions(
    State(state): State<AppState>,
    Query(query): Query<ListPredictionsQuery>,
) -> Result<Json<PredictionListResponse>> {
    let filter = PredictionFilter {
        risk_band: query.risk_band,
        limit: Some(query.limit.unwrap_or(50)),
    };

    let predictions: Vec<PredictionResponse> = state
        .service
        .recent(&filter)
        .await?
        .into_iter()
        .map(PredictionResponse::from)
        .collect();
    let total = state.service.prediction_count().await?;

    Ok(Json(PredictionListResponse { predictions, total }))
}

#[derive(Debug, Deserialize)]
pub struct ListPredictionsQuery {
    pub risk_band: Option<RiskBand>,
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct PredictionListResponse {
    pub predictions: Vec<PredictionResponse>,
    pub total: usize,
}

/// Get a single prediction by ID
pub async fn get_prediction(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<PredictionResponse>> {
    let record = state.service.prediction(&id).await?;
    Ok(Json(PredictionResponse::from(record)))
}

/// Metadata and evaluation metrics for the loaded models
pub async fn list_models(State(state): State<AppState>) -> Result<Json<ModelListResponse>> {
    Ok(Json(ModelListResponse {
        models: state.service.model_info(),
    }))
}

#[derive(Debug, Serialize)]
pub struct ModelListResponse {
    pub models: Vec<ModelInfo>,
}
