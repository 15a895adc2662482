use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    /// The training or scoring source could not be read
    #[error("Source unavailable: {0}")]
    SourceUnavailable(String),

    /// A required column is absent from the ingested source
    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    /// A prediction request is missing a required raw field
    #[error("Incomplete input: missing field `{0}`")]
    IncompleteInput(String),

    /// A categorical value was never observed when the transformer was fitted
    #[error("Unknown category `{value}` for feature `{feature}`")]
    UnknownCategory { feature: String, value: String },

    /// A fitted standard deviation of zero makes standardization impossible.
    /// Fatal configuration error; never recovered silently.
    #[error("Division by zero: feature `{0}` has zero fitted standard deviation")]
    DivisionByZero(String),

    /// Transformed columns do not line up with the model's feature order
    #[error("Column mismatch: {0}")]
    ColumnMismatch(String),

    /// A persisted bundle does not match what this build expects
    #[error("Incompatible bundle: {0}")]
    IncompatibleBundle(String),

    /// Not found errors
    #[error("Not found: {0}")]
    NotFound(String),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Storage errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Get HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::SourceUnavailable(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::SchemaMismatch(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::IncompleteInput(_) => StatusCode::BAD_REQUEST,
            AppError::UnknownCategory { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::DivisionByZero(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::ColumnMismatch(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::IncompatibleBundle(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get error code string
    pub fn error_code(&self) -> &str {
        match self {
            AppError::SourceUnavailable(_) => "SOURCE_UNAVAILABLE",
            AppError::SchemaMismatch(_) => "SCHEMA_MISMATCH",
            AppError::IncompleteInput(_) => "INCOMPLETE_INPUT",
            AppError::UnknownCategory { .. } => "UNKNOWN_CATEGORY",
            AppError::DivisionByZero(_) => "DIVISION_BY_ZERO",
            AppError::ColumnMismatch(_) => "COLUMN_MISMATCH",
            AppError::IncompatibleBundle(_) => "INCOMPATIBLE_BUNDLE",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::Storage(_) => "STORAGE_ERROR",
            AppError::Configuration(_) => "CONFIGURATION_ERROR",
            AppError::Io(_) => "IO_ERROR",
            AppError::Serialization(_) => "SERIALIZATION_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

/// Convert AppError to HTTP response
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_code = self.error_code();
        let message = self.to_string();

        tracing::error!(
            error_code = error_code,
            status_code = status.as_u16(),
            message = %message,
            "Request error"
        );

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
                "status": status.as_u16(),
            }
        }));

        (status, body).into_response()
    }
}

/// Conversion from serde_json::Error
impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Conversion from validator::ValidationErrors
impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::Validation(err.to_string())
    }
}

/// Conversion from config::ConfigError
impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Configuration(err.to_string())
    }
}

/// Conversion from bincode::Error
impl From<bincode::Error> for AppError {
    fn from(err: bincode::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, AppError>;
