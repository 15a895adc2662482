use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::{DerivedLabels, RawFeatures};

/// How the ParentalSupport clause of the dropout rule is evaluated.
///
/// Both variants exist in production rulebooks: one compares the raw
/// category, the other compares an ordinal level against a cut.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum SupportRule {
    /// Risk when the raw category equals `at` (e.g. "Low")
    Category { at: String },

    /// Risk when the category's position in `order` is below `cut`
    LevelBelow { order: Vec<String>, cut: usize },
}

impl SupportRule {
    fn is_at_risk(&self, category: &str) -> Result<bool> {
        match self {
            SupportRule::Category { at } => Ok(category == at),
            SupportRule::LevelBelow { order, cut } => {
                let level = order
                    .iter()
                    .position(|c| c == category)
                    .ok_or_else(|| AppError::UnknownCategory {
                        feature: "ParentalSupport".to_string(),
                        value: category.to_string(),
                    })?;
                Ok(level < *cut)
            }
        }
    }
}

/// Thresholds for deriving the two risk labels. All comparisons are
/// strict `<`: a value exactly at a threshold is not at risk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelRules {
    pub attendance_below: f64,
    pub final_grade_below: f64,
    pub study_hours_below: f64,
    pub underperform_below: f64,
    pub support_rule: SupportRule,
}

impl LabelRules {
    /// 50/60/8 thresholds with the ordinal support comparison
    pub fn baseline() -> Self {
        Self {
            attendance_below: 50.0,
            final_grade_below: 60.0,
            study_hours_below: 8.0,
            underperform_below: 70.0,
            support_rule: SupportRule::LevelBelow {
                order: vec![
                    "Low".to_string(),
                    "Medium".to_string(),
                    "High".to_string(),
                ],
                cut: 1,
            },
        }
    }

    /// 60/65/10 thresholds with the categorical support comparison
    pub fn strict() -> Self {
        Self {
            attendance_below: 60.0,
            final_grade_below: 65.0,
            study_hours_below: 10.0,
            underperform_below: 70.0,
            support_rule: SupportRule::Category {
                at: "Low".to_string(),
            },
        }
    }

    /// Resolve a named preset from configuration
    pub fn preset(name: &str) -> Result<Self> {
        match name {
            "baseline" => Ok(Self::baseline()),
            "strict" => Ok(Self::strict()),
            other => Err(AppError::Configuration(format!(
                "unknown label rule preset `{other}` (expected `baseline` or `strict`)"
            ))),
        }
    }
}

/// Derive both target labels from one raw record. Pure: no state, no
/// side effects, deterministic for a given record and rule set.
pub fn derive_labels(features: &RawFeatures, rules: &LabelRules) -> Result<DerivedLabels> {
    let support_at_risk = rules.support_rule.is_at_risk(&features.parental_support)?;

    let dropout_risk = features.attendance_rate < rules.attendance_below
        || support_at_risk
        || features.final_grade < rules.final_grade_below
        || features.study_hours_per_week < rules.study_hours_below;

    let underperform = features.final_grade < rules.underperform_below;

    Ok(DerivedLabels {
        dropout_risk: u8::from(dropout_risk),
        underperform: u8::from(underperform),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Gender;

    fn features(
        attendance: f64,
        hours: f64,
        previous: f64,
        final_grade: f64,
        support: &str,
    ) -> RawFeatures {
        RawFeatures {
            gender: Gender::Female,
            parental_support: support.to_string(),
            attendance_rate: attendance,
            study_hours_per_week: hours,
            previous_grade: previous,
            final_grade,
            extracurricular_activities: Some(2.0),
        }
    }

    #[test]
    fn derivation_is_deterministic() {
        let rules = LabelRules::strict();
        let row = features(55.0, 5.0, 60.0, 58.0, "Low");
        let first = derive_labels(&row, &rules).unwrap();
        for _ in 0..10 {
            assert_eq!(derive_labels(&row, &rules).unwrap(), first);
        }
    }

    #[test]
    fn strict_preset_trips_all_four_clauses() {
        let rules = LabelRules::strict();
        let row = features(55.0, 5.0, 60.0, 58.0, "Low");
        let labels = derive_labels(&row, &rules).unwrap();
        assert_eq!(labels.dropout_risk, 1);
        assert_eq!(labels.underperform, 1);
    }

    #[test]
    fn attendance_exactly_at_threshold_is_not_at_risk() {
        let rules = LabelRules::strict();
        // Every other clause comfortably clear
        let row = features(60.0, 20.0, 90.0, 90.0, "High");
        let labels = derive_labels(&row, &rules).unwrap();
        assert_eq!(labels.dropout_risk, 0);
    }

    #[test]
    fn final_grade_exactly_seventy_is_not_underperform() {
        let rules = LabelRules::strict();
        let row = features(90.0, 20.0, 90.0, 70.0, "High");
        let labels = derive_labels(&row, &rules).unwrap();
        assert_eq!(labels.underperform, 0);

        let row = features(90.0, 20.0, 90.0, 69.9, "High");
        let labels = derive_labels(&row, &rules).unwrap();
        assert_eq!(labels.underperform, 1);
    }

    #[test]
    fn baseline_preset_uses_ordinal_cut() {
        let rules = LabelRules::baseline();

        let low = features(90.0, 20.0, 90.0, 90.0, "Low");
        assert_eq!(derive_labels(&low, &rules).unwrap().dropout_risk, 1);

        let medium = features(90.0, 20.0, 90.0, 90.0, "Medium");
        assert_eq!(derive_labels(&medium, &rules).unwrap().dropout_risk, 0);
    }

    #[test]
    fn ordinal_rule_rejects_unknown_category() {
        let rules = LabelRules::baseline();
        let row = features(90.0, 20.0, 90.0, 90.0, "Extreme");
        let err = derive_labels(&row, &rules).unwrap_err();
        assert!(matches!(err, AppError::UnknownCategory { .. }));
    }

    #[test]
    fn unknown_preset_name_is_a_configuration_error() {
        assert!(matches!(
            LabelRules::preset("lenient"),
            Err(AppError::Configuration(_))
        ));
        assert!(LabelRules::preset("baseline").is_ok());
        assert!(LabelRules::preset("strict").is_ok());
    }
}
