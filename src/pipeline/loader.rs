use std::path::Path;

use crate::error::{AppError, Result};
use crate::models::StudentRecord;

/// Columns that must be present in every source
const REQUIRED_COLUMNS: [&str; 8] = [
    "StudentID",
    "Name",
    "Gender",
    "ParentalSupport",
    "AttendanceRate",
    "StudyHoursPerWeek",
    "PreviousGrade",
    "FinalGrade",
];

/// Load student records from a CSV source.
///
/// Ingestion is all-or-nothing: a schema problem or an unparseable row
/// aborts the whole batch rather than producing a partial corpus.
pub fn load_csv(path: &Path) -> Result<Vec<StudentRecord>> {
    let mut reader = csv::Reader::from_path(path).map_err(|e| {
        AppError::SourceUnavailable(format!("cannot read `{}`: {e}", path.display()))
    })?;

    let headers = reader
        .headers()
        .map_err(|e| AppError::SourceUnavailable(format!("cannot read headers: {e}")))?
        .clone();

    let missing: Vec<&str> = REQUIRED_COLUMNS
        .iter()
        .filter(|required| !headers.iter().any(|h| h == **required))
        .copied()
        .collect();
    if !missing.is_empty() {
        return Err(AppError::SchemaMismatch(format!(
            "missing required columns: {}",
            missing.join(", ")
        )));
    }

    let mut records = Vec::new();
    for (line, result) in reader.deserialize::<StudentRecord>().enumerate() {
        let record = result.map_err(|e| {
            AppError::SchemaMismatch(format!("row {}: {e}", line + 2))
        })?;

        for (column, value) in record.features().numeric_fields() {
            if !value.is_finite() {
                return Err(AppError::SchemaMismatch(format!(
                    "row {}: non-finite value in column {column}",
                    line + 2
                )));
            }
        }

        records.push(record);
    }

    tracing::info!(rows = records.len(), source = %path.display(), "Loaded student records");
    Ok(records)
}
