use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{AppError, Result};
use crate::models::RawFeatures;

/// Numeric features standardized with the fitted mean/std
pub const SCALED_COLUMNS: [&str; 4] = [
    "AttendanceRate",
    "StudyHoursPerWeek",
    "PreviousGrade",
    "FinalGrade",
];

/// Fixed one-hot expansion of Gender. Both columns are always emitted,
/// even when a category is absent from a batch, so column order never
/// depends on the data.
pub const GENDER_COLUMNS: [&str; 2] = ["Gender_Female", "Gender_Male"];

pub const SUPPORT_LEVEL_COLUMN: &str = "ParentalSupportLevel";
pub const EXTRACURRICULAR_COLUMN: &str = "ExtracurricularActivities";

/// Per-numeric-feature standardization parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumericScaler {
    pub column: String,
    pub mean: f64,
    pub std_dev: f64,
}

/// State fitted once on the training corpus and reused, unchanged, for
/// every subsequent transform. Inference must never re-fit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedTransformerState {
    /// ParentalSupport category -> ordinal level, lexically ordered.
    /// Lexical order keeps the mapping independent of row order in the
    /// training corpus.
    support_levels: BTreeMap<String, usize>,

    /// Mean/std pairs for the scaled numeric columns, in SCALED_COLUMNS order
    scalers: Vec<NumericScaler>,

    /// Whether ExtracurricularActivities is carried as a raw column
    include_extracurricular: bool,
}

impl FittedTransformerState {
    /// The exact column sequence `transform` produces
    pub fn feature_columns(&self) -> Vec<String> {
        let mut columns: Vec<String> = SCALED_COLUMNS.iter().map(|c| c.to_string()).collect();
        if self.include_extracurricular {
            columns.push(EXTRACURRICULAR_COLUMN.to_string());
        }
        columns.extend(GENDER_COLUMNS.iter().map(|c| c.to_string()));
        columns.push(SUPPORT_LEVEL_COLUMN.to_string());
        columns
    }

    /// Ordinal level for a category observed at fit time
    pub fn support_level(&self, category: &str) -> Result<usize> {
        self.support_levels
            .get(category)
            .copied()
            .ok_or_else(|| AppError::UnknownCategory {
                feature: "ParentalSupport".to_string(),
                value: category.to_string(),
            })
    }

    pub fn known_categories(&self) -> impl Iterator<Item = &str> {
        self.support_levels.keys().map(|s| s.as_str())
    }

    pub fn include_extracurricular(&self) -> bool {
        self.include_extracurricular
    }
}

/// A transformed batch: one row per input record, columns owned by the
/// fitted state
#[derive(Debug, Clone)]
pub struct FeatureMatrix {
    pub columns: Vec<String>,
    pub values: Array2<f64>,
}

impl FeatureMatrix {
    pub fn n_rows(&self) -> usize {
        self.values.nrows()
    }

    /// Reorder columns into the order a trained model expects. Any
    /// expected column missing here is a fatal contract violation.
    pub fn reindex(&self, order: &[String]) -> Result<Array2<f64>> {
        let mut indices = Vec::with_capacity(order.len());
        for column in order {
            let idx = self
                .columns
                .iter()
                .position(|c| c == column)
                .ok_or_else(|| {
                    AppError::ColumnMismatch(format!(
                        "expected column `{column}` is missing from the transformed row"
                    ))
                })?;
            indices.push(idx);
        }

        let mut reordered = Array2::zeros((self.values.nrows(), order.len()));
        for (out_col, &src_col) in indices.iter().enumerate() {
            for row in 0..self.values.nrows() {
                reordered[[row, out_col]] = self.values[[row, src_col]];
            }
        }
        Ok(reordered)
    }
}

/// Fit the transformer state on the training corpus: the ordinal mapping
/// over every observed ParentalSupport category, and mean/std for each
/// scaled numeric column.
pub fn fit(rows: &[RawFeatures], include_extracurricular: bool) -> Result<FittedTransformerState> {
    if rows.is_empty() {
        return Err(AppError::Validation(
            "cannot fit transformer on an empty corpus".to_string(),
        ));
    }

    let mut categories: Vec<&str> = rows.iter().map(|r| r.parental_support.as_str()).collect();
    categories.sort_unstable();
    categories.dedup();

    let support_levels: BTreeMap<String, usize> = categories
        .into_iter()
        .enumerate()
        .map(|(level, category)| (category.to_string(), level))
        .collect();

    let n = rows.len() as f64;
    let mut scalers = Vec::with_capacity(SCALED_COLUMNS.len());
    for (idx, column) in SCALED_COLUMNS.iter().enumerate() {
        let values: Vec<f64> = rows.iter().map(|r| r.numeric_fields()[idx].1).collect();
        let mean = values.iter().sum::<f64>() / n;
        // Population variance, matching the standard scaler convention
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        scalers.push(NumericScaler {
            column: column.to_string(),
            mean,
            std_dev: variance.sqrt(),
        });
    }

    Ok(FittedTransformerState {
        support_levels,
        scalers,
        include_extracurricular,
    })
}

/// Transform a batch of raw rows with a previously fitted state.
/// Applied to a training row with the state fitted on its corpus, this
/// reproduces the exact values consumed during training.
pub fn transform(rows: &[RawFeatures], state: &FittedTransformerState) -> Result<FeatureMatrix> {
    let columns = state.feature_columns();
    let mut values = Array2::zeros((rows.len(), columns.len()));

    for (row_idx, row) in rows.iter().enumerate() {
        let encoded = transform_row(row, state)?;
        for (col_idx, value) in encoded.into_iter().enumerate() {
            values[[row_idx, col_idx]] = value;
        }
    }

    Ok(FeatureMatrix { columns, values })
}

/// Transform a single raw row into the state's column order
pub fn transform_row(row: &RawFeatures, state: &FittedTransformerState) -> Result<Vec<f64>> {
    let mut encoded = Vec::with_capacity(state.feature_columns().len());

    for (idx, scaler) in state.scalers.iter().enumerate() {
        if scaler.std_dev == 0.0 {
            return Err(AppError::DivisionByZero(scaler.column.clone()));
        }
        let raw = row.numeric_fields()[idx].1;
        encoded.push((raw - scaler.mean) / scaler.std_dev);
    }

    if state.include_extracurricular {
        let value = row.extracurricular_activities.ok_or_else(|| {
            AppError::IncompleteInput(EXTRACURRICULAR_COLUMN.to_string())
        })?;
        encoded.push(value);
    }

    // Gender_Female, Gender_Male
    match row.gender {
        crate::models::Gender::Female => {
            encoded.push(1.0);
            encoded.push(0.0);
        }
        crate::models::Gender::Male => {
            encoded.push(0.0);
            encoded.push(1.0);
        }
    }

    encoded.push(state.support_level(&row.parental_support)? as f64);

    Ok(encoded)
}
