use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{AppError, Result};
use crate::models::RiskTarget;
use crate::pipeline::forest::RiskForest;
use crate::pipeline::metrics::MetricReport;
use crate::pipeline::transform::FittedTransformerState;

/// Bump when the bundle layout changes; loading an older version is an
/// IncompatibleBundle error, never a silent migration.
pub const BUNDLE_SCHEMA_VERSION: u32 = 1;

/// Everything inference needs for one target, persisted as a single
/// versioned unit. The fitted transformer state and the trained model
/// always travel together; loading one without the matching other is
/// exactly the corruption this type exists to prevent.
#[derive(Serialize, Deserialize)]
pub struct ModelBundle {
    pub schema_version: u32,
    pub target: RiskTarget,
    pub preset: String,
    pub state: FittedTransformerState,
    pub feature_order: Vec<String>,
    pub forest: RiskForest,
    pub report: MetricReport,
    pub trained_at: DateTime<Utc>,
}

impl ModelBundle {
    pub fn new(
        target: RiskTarget,
        preset: String,
        state: FittedTransformerState,
        forest: RiskForest,
        report: MetricReport,
    ) -> Self {
        let feature_order = state.feature_columns();
        Self {
            schema_version: BUNDLE_SCHEMA_VERSION,
            target,
            preset,
            state,
            feature_order,
            forest,
            report,
            trained_at: Utc::now(),
        }
    }

    fn file_name(target: RiskTarget) -> String {
        format!("riskly-{}.bundle", target.as_str())
    }

    pub fn path_for(dir: &Path, target: RiskTarget) -> PathBuf {
        dir.join(Self::file_name(target))
    }

    /// Persist to `<dir>/riskly-<target>.bundle`
    pub fn save(&self, dir: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(dir)?;
        let path = Self::path_for(dir, self.target);
        let encoded = bincode::serialize(self)?;
        std::fs::write(&path, encoded)?;
        tracing::info!(
            target = %self.target,
            path = %path.display(),
            "Persisted model bundle"
        );
        Ok(path)
    }

    /// Load and verify a persisted bundle
    pub fn load(dir: &Path, target: RiskTarget) -> Result<Self> {
        let path = Self::path_for(dir, target);
        let bytes = std::fs::read(&path).map_err(|e| {
            AppError::NotFound(format!("bundle `{}`: {e}", path.display()))
        })?;
        let bundle: ModelBundle = bincode::deserialize(&bytes)?;
        bundle.verify()?;

        if bundle.target != target {
            return Err(AppError::IncompatibleBundle(format!(
                "bundle at `{}` was trained for target `{}`",
                path.display(),
                bundle.target
            )));
        }

        Ok(bundle)
    }

    /// Internal consistency checks between the transformer state, the
    /// feature order and the trained model
    pub fn verify(&self) -> Result<()> {
        if self.schema_version != BUNDLE_SCHEMA_VERSION {
            return Err(AppError::IncompatibleBundle(format!(
                "schema version {} (expected {})",
                self.schema_version, BUNDLE_SCHEMA_VERSION
            )));
        }

        let state_columns = self.state.feature_columns();
        if state_columns != self.feature_order {
            return Err(AppError::IncompatibleBundle(format!(
                "transformer state produces columns {:?} but the model was trained on {:?}",
                state_columns, self.feature_order
            )));
        }

        if self.forest.n_features() != self.feature_order.len() {
            return Err(AppError::IncompatibleBundle(format!(
                "model expects {} features but the bundle carries {} columns",
                self.forest.n_features(),
                self.feature_order.len()
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Gender, RawFeatures};
    use crate::pipeline::forest::ForestParams;
    use crate::pipeline::{metrics, transform};
    use ndarray::Array2;

    fn sample_rows() -> Vec<RawFeatures> {
        (0..20)
            .map(|i| RawFeatures {
                gender: if i % 2 == 0 {
                    Gender::Female
                } else {
                    Gender::Male
                },
                parental_support: ["Low", "Medium", "High"][i % 3].to_string(),
                attendance_rate: 40.0 + (i as f64) * 3.0,
                study_hours_per_week: 2.0 + (i as f64),
                previous_grade: 50.0 + (i as f64) * 2.0,
                final_grade: 45.0 + (i as f64) * 2.5,
                extracurricular_activities: Some((i % 4) as f64),
            })
            .collect()
    }

    fn sample_bundle() -> ModelBundle {
        let rows = sample_rows();
        let state = transform::fit(&rows, true).unwrap();
        let matrix = transform::transform(&rows, &state).unwrap();
        let labels: Vec<u8> = (0..rows.len()).map(|i| u8::from(i % 2 == 0)).collect();
        let forest = RiskForest::fit(
            &matrix.values,
            &labels,
            ForestParams {
                n_trees: 5,
                max_depth: 4,
                seed: 42,
            },
        )
        .unwrap();
        let report = metrics::evaluate(&labels, &labels, &vec![0.5; labels.len()]);

        ModelBundle::new(
            RiskTarget::Dropout,
            "strict".to_string(),
            state,
            forest,
            report,
        )
    }

    #[test]
    fn save_load_round_trip_preserves_predictions() {
        let bundle = sample_bundle();
        let rows = sample_rows();
        let matrix = transform::transform(&rows, &bundle.state).unwrap();
        let before = bundle.forest.predict_proba(&matrix.values).unwrap();

        let dir = tempfile::tempdir().unwrap();
        bundle.save(dir.path()).unwrap();

        let loaded = ModelBundle::load(dir.path(), RiskTarget::Dropout).unwrap();
        let after = loaded.forest.predict_proba(&matrix.values).unwrap();
        assert_eq!(before, after);
        assert_eq!(loaded.feature_order, bundle.feature_order);
    }

    #[test]
    fn missing_bundle_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            ModelBundle::load(dir.path(), RiskTarget::Underperform),
            Err(AppError::NotFound(_))
        ));
    }

    #[test]
    fn schema_version_mismatch_is_incompatible() {
        let mut bundle = sample_bundle();
        bundle.schema_version = 0;
        assert!(matches!(
            bundle.verify(),
            Err(AppError::IncompatibleBundle(_))
        ));
    }

    #[test]
    fn tampered_feature_order_is_incompatible() {
        let mut bundle = sample_bundle();
        bundle.feature_order.reverse();
        assert!(matches!(
            bundle.verify(),
            Err(AppError::IncompatibleBundle(_))
        ));
    }

    #[test]
    fn wrong_target_file_is_incompatible() {
        let bundle = sample_bundle();
        let dir = tempfile::tempdir().unwrap();
        let saved = bundle.save(dir.path()).unwrap();

        // Masquerade the dropout bundle as the underperform one
        let imposter = ModelBundle::path_for(dir.path(), RiskTarget::Underperform);
        std::fs::copy(saved, imposter).unwrap();

        assert!(matches!(
            ModelBundle::load(dir.path(), RiskTarget::Underperform),
            Err(AppError::IncompatibleBundle(_))
        ));
    }
}
