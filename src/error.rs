use std::fmt;

use rusqlite;
use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::{error, warn};

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionErrorCode {
    MissingApiKey,
    Forbidden,
    HttpTimeout,
    RateLimited,
    FormatError,
    InvalidRequest,
    Unavailable,
    Unknown,
}

impl ExtractionErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ExtractionErrorCode::MissingApiKey => "MISSING_API_KEY",
            ExtractionErrorCode::Forbidden => "FORBIDDEN",
            ExtractionErrorCode::HttpTimeout => "HTTP_TIMEOUT",
            ExtractionErrorCode::RateLimited => "RATE_LIMITED",
            ExtractionErrorCode::FormatError => "EXTRACTION_FORMAT_ERROR",
            ExtractionErrorCode::InvalidRequest => "INVALID_REQUEST",
            ExtractionErrorCode::Unavailable => "EXTRACTION_UNAVAILABLE",
            ExtractionErrorCode::Unknown => "UNKNOWN_EXTRACTION_ERROR",
        }
    }
}

impl fmt::Display for ExtractionErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("database error: {message}")]
    Database { message: String },

    #[error("record not found")]
    NotFound,

    #[error("record conflict: {message}")]
    Conflict { message: String },

    #[error("validation failed: {message}")]
    Validation {
        message: String,
        details: Option<JsonValue>,
    },

    #[error("invalid clock time: {value}")]
    InvalidTimeFormat { value: String },

    #[error("minutes out of range: {minutes}")]
    MinutesOutOfRange { minutes: i64 },

    #[error("{message}")]
    Extraction {
        code: ExtractionErrorCode,
        message: String,
        correlation_id: Option<String>,
        details: Option<JsonValue>,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        let message = message.into();
        warn!(target: "app::validation", %message, "validation error");
        AppError::Validation {
            message,
            details: None,
        }
    }

    pub fn validation_with_details(message: impl Into<String>, details: JsonValue) -> Self {
        let message = message.into();
        warn!(target: "app::validation", %message, details = %details, "validation error with details");
        AppError::Validation {
            message,
            details: Some(details),
        }
    }

    pub fn invalid_time_format(value: impl Into<String>) -> Self {
        let value = value.into();
        warn!(target: "app::time", %value, "unparseable clock time");
        AppError::InvalidTimeFormat { value }
    }

    pub fn minutes_out_of_range(minutes: i64) -> Self {
        warn!(target: "app::time", minutes, "minute-of-day outside [0, 1440)");
        AppError::MinutesOutOfRange { minutes }
    }

    pub fn extraction(code: ExtractionErrorCode, message: impl Into<String>) -> Self {
        Self::extraction_with_details(code, message, None, None)
    }

    pub fn extraction_with_details(
        code: ExtractionErrorCode,
        message: impl Into<String>,
        correlation_id: Option<&str>,
        details: Option<JsonValue>,
    ) -> Self {
        let message = message.into();
        let correlation = correlation_id.map(|value| value.to_string());
        match (&correlation, &details) {
            (Some(id), Some(payload)) => {
                warn!(
                    target: "app::extraction::error",
                    code = %code,
                    correlation_id = %id,
                    details = %payload,
                    %message
                );
            }
            (Some(id), None) => {
                warn!(
                    target: "app::extraction::error",
                    code = %code,
                    correlation_id = %id,
                    %message
                );
            }
            (None, Some(payload)) => {
                warn!(target: "app::extraction::error", code = %code, details = %payload, %message);
            }
            (None, None) => {
                warn!(target: "app::extraction::error", code = %code, %message);
            }
        }

        AppError::Extraction {
            code,
            message,
            correlation_id: correlation,
            details,
        }
    }

    pub fn extraction_code(&self) -> Option<ExtractionErrorCode> {
        match self {
            AppError::Extraction { code, .. } => Some(*code),
            _ => None,
        }
    }

    pub fn extraction_correlation_id(&self) -> Option<&str> {
        match self {
            AppError::Extraction { correlation_id, .. } => correlation_id.as_deref(),
            _ => None,
        }
    }

    pub fn extraction_details(&self) -> Option<&JsonValue> {
        match self {
            AppError::Extraction { details, .. } => details.as_ref(),
            _ => None,
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        let message = message.into();
        warn!(target: "app::conflict", %message, "conflict error");
        AppError::Conflict { message }
    }

    pub fn not_found() -> Self {
        warn!(target: "app::db", "resource not found");
        AppError::NotFound
    }

    pub fn database(message: impl Into<String>) -> Self {
        let message = message.into();
        error!(target: "app::db", %message, "database error");
        AppError::Database { message }
    }

    pub fn other(message: impl Into<String>) -> Self {
        let message = message.into();
        error!(target: "app::other", %message, "other error");
        AppError::Other(message)
    }
}

impl From<rusqlite::Error> for AppError {
    fn from(error: rusqlite::Error) -> Self {
        use rusqlite::Error::{QueryReturnedNoRows, SqliteFailure};
        use rusqlite::ErrorCode;

        match &error {
            QueryReturnedNoRows => AppError::not_found(),
            SqliteFailure(err, _) if err.code == ErrorCode::ConstraintViolation => {
                AppError::conflict("unique or foreign key constraint violated")
            }
            _ => {
                error!(target: "app::db", error = ?error, "sqlite error");
                AppError::database(error.to_string())
            }
        }
    }
}
