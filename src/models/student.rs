use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Gender of a student, a closed two-category feature
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "Male",
            Gender::Female => "Female",
        }
    }
}

/// Raw feature fields shared by training rows and prediction requests.
///
/// These are the only fields the pipeline ever consumes; identifier and
/// contact fields never enter the feature set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawFeatures {
    #[serde(rename = "Gender")]
    pub gender: Gender,

    #[serde(rename = "ParentalSupport")]
    pub parental_support: String,

    #[serde(rename = "AttendanceRate")]
    pub attendance_rate: f64,

    #[serde(rename = "StudyHoursPerWeek")]
    pub study_hours_per_week: f64,

    #[serde(rename = "PreviousGrade")]
    pub previous_grade: f64,

    #[serde(rename = "FinalGrade")]
    pub final_grade: f64,

    #[serde(rename = "ExtracurricularActivities", default)]
    pub extracurricular_activities: Option<f64>,
}

impl RawFeatures {
    /// Numeric fields that must be finite for the row to be usable
    pub fn numeric_fields(&self) -> [(&'static str, f64); 4] {
        [
            ("AttendanceRate", self.attendance_rate),
            ("StudyHoursPerWeek", self.study_hours_per_week),
            ("PreviousGrade", self.previous_grade),
            ("FinalGrade", self.final_grade),
        ]
    }
}

/// One ingested student row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudentRecord {
    #[serde(rename = "StudentID")]
    pub student_id: i64,

    #[serde(rename = "Name")]
    pub name: String,

    #[serde(rename = "Email", default)]
    pub email: Option<String>,

    #[serde(rename = "Gender")]
    pub gender: Gender,

    #[serde(rename = "ParentalSupport")]
    pub parental_support: String,

    #[serde(rename = "AttendanceRate")]
    pub attendance_rate: f64,

    #[serde(rename = "StudyHoursPerWeek")]
    pub study_hours_per_week: f64,

    #[serde(rename = "PreviousGrade")]
    pub previous_grade: f64,

    #[serde(rename = "FinalGrade")]
    pub final_grade: f64,

    #[serde(rename = "ExtracurricularActivities", default)]
    pub extracurricular_activities: Option<f64>,
}

impl StudentRecord {
    /// Feature view of this row; identifier and contact fields are dropped
    pub fn features(&self) -> RawFeatures {
        RawFeatures {
            gender: self.gender,
            parental_support: self.parental_support.clone(),
            attendance_rate: self.attendance_rate,
            study_hours_per_week: self.study_hours_per_week,
            previous_grade: self.previous_grade,
            final_grade: self.final_grade,
            extracurricular_activities: self.extracurricular_activities,
        }
    }
}

/// The two risk targets the pipeline predicts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskTarget {
    Dropout,
    Underperform,
}

impl RiskTarget {
    pub const ALL: [RiskTarget; 2] = [RiskTarget::Dropout, RiskTarget::Underperform];

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskTarget::Dropout => "dropout",
            RiskTarget::Underperform => "underperform",
        }
    }
}

impl std::fmt::Display for RiskTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RiskTarget {
    type Err = crate::error::AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dropout" => Ok(RiskTarget::Dropout),
            "underperform" => Ok(RiskTarget::Underperform),
            other => Err(crate::error::AppError::Validation(format!(
                "unknown risk target `{other}` (expected `dropout` or `underperform`)"
            ))),
        }
    }
}

/// Labels derived from business rules. Never part of the feature set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivedLabels {
    pub dropout_risk: u8,
    pub underperform: u8,
}

impl DerivedLabels {
    pub fn label_for(&self, target: RiskTarget) -> u8 {
        match target {
            RiskTarget::Dropout => self.dropout_risk,
            RiskTarget::Underperform => self.underperform,
        }
    }
}

/// Hard label plus positive-class probability for one target
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TargetPrediction {
    pub label: u8,
    pub probability: f64,
}

/// Coarse banding over the two labels, surfaced to advisor-facing clients
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskBand {
    NoRisk,
    MediumRisk,
    HighRisk,
}

impl RiskBand {
    pub fn from_labels(dropout: u8, underperform: u8) -> Self {
        match u32::from(dropout) + u32::from(underperform) {
            0 => RiskBand::NoRisk,
            1 => RiskBand::MediumRisk,
            _ => RiskBand::HighRisk,
        }
    }
}

/// A persisted prediction. Append-only; one per successful inference call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionRecord {
    pub id: Uuid,
    pub gender: Gender,
    pub parental_support: String,
    pub attendance_rate: f64,
    pub study_hours_per_week: f64,
    pub previous_grade: f64,
    pub final_grade: f64,
    pub extracurricular_activities: Option<f64>,
    pub dropout_risk: u8,
    pub dropout_probability: f64,
    pub underperform_risk: u8,
    pub underperform_probability: f64,
    pub risk_band: RiskBand,
    pub requested_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl PredictionRecord {
    pub fn new(
        features: RawFeatures,
        dropout: TargetPrediction,
        underperform: TargetPrediction,
        requested_by: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            gender: features.gender,
            parental_support: features.parental_support,
            attendance_rate: features.attendance_rate,
            study_hours_per_week: features.study_hours_per_week,
            previous_grade: features.previous_grade,
            final_grade: features.final_grade,
            extracurricular_activities: features.extracurricular_activities,
            dropout_risk: dropout.label,
            dropout_probability: dropout.probability,
            underperform_risk: underperform.label,
            underperform_probability: underperform.probability,
            risk_band: RiskBand::from_labels(dropout.label, underperform.label),
            requested_by,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn risk_band_counts_set_labels() {
        assert_eq!(RiskBand::from_labels(0, 0), RiskBand::NoRisk);
        assert_eq!(RiskBand::from_labels(1, 0), RiskBand::MediumRisk);
        assert_eq!(RiskBand::from_labels(0, 1), RiskBand::MediumRisk);
        assert_eq!(RiskBand::from_labels(1, 1), RiskBand::HighRisk);
    }

    #[test]
    fn prediction_record_copies_input_fields() {
        let features = RawFeatures {
            gender: Gender::Female,
            parental_support: "Low".to_string(),
            attendance_rate: 55.0,
            study_hours_per_week: 5.0,
            previous_grade: 60.0,
            final_grade: 58.0,
            extracurricular_activities: Some(2.0),
        };

        let record = PredictionRecord::new(
            features,
            TargetPrediction {
                label: 1,
                probability: 0.9,
            },
            TargetPrediction {
                label: 1,
                probability: 0.8,
            },
            Some("advisor@riskly.app".to_string()),
        );

        assert_eq!(record.final_grade, 58.0);
        assert_eq!(record.dropout_risk, 1);
        assert_eq!(record.risk_band, RiskBand::HighRisk);
        assert!(record.requested_by.is_some());
    }
}
