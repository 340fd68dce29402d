//! Shared API types
//!
//! Error responses are JSON objects of the form
//! `{"error": <kind>, "code": <CODE>, "message": <text>}`.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use validator::ValidationError;

use crate::data::DataError;
use crate::domain::search::FilterParseError;

/// Maximum ID length (trace id, snapshot id, component id, ...)
pub const MAX_ID_LENGTH: usize = 256;
/// Maximum length of a component annotation
pub const MAX_ANNOTATION_LENGTH: usize = 16 * 1024;

/// Validator function for free-form identifiers
pub fn validate_id(id: &str) -> Result<(), ValidationError> {
    if id.trim().is_empty() {
        return Err(ValidationError::new("id_empty").with_message("ID cannot be empty".into()));
    }
    if id.len() > MAX_ID_LENGTH {
        return Err(ValidationError::new("id_too_long")
            .with_message(format!("ID too long (max {} chars)", MAX_ID_LENGTH).into()));
    }
    Ok(())
}

/// Standard API error response
#[derive(Debug)]
pub enum ApiError {
    BadRequest { code: String, message: String },
    NotFound { code: String, message: String },
    Internal { message: String },
}

impl ApiError {
    pub fn bad_request(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::BadRequest {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn not_found(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::NotFound {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Missing records become 404; anything else is logged and hidden behind a 500
    pub fn from_data(e: DataError) -> Self {
        match e {
            DataError::NotFound(what) => Self::not_found("NOT_FOUND", format!("Not found: {}", what)),
            e => {
                tracing::error!(error = %e, backend = e.backend(), "Data error");
                Self::internal("Storage operation failed")
            }
        }
    }
}

impl From<DataError> for ApiError {
    fn from(e: DataError) -> Self {
        Self::from_data(e)
    }
}

impl From<FilterParseError> for ApiError {
    fn from(e: FilterParseError) -> Self {
        let code = match e {
            FilterParseError::TooLarge { .. } => "FILTER_TOO_LARGE",
            FilterParseError::TooDeep { .. } | FilterParseError::TooManyNodes { .. } => {
                "FILTER_TOO_COMPLEX"
            }
            FilterParseError::Invalid(_) => "INVALID_FILTER",
        };
        Self::bad_request(code, e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, code, message) = match self {
            Self::BadRequest { code, message } => {
                (StatusCode::BAD_REQUEST, "bad_request", code, message)
            }
            Self::NotFound { code, message } => (StatusCode::NOT_FOUND, "not_found", code, message),
            Self::Internal { message } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "INTERNAL".to_string(),
                message,
            ),
        };
        (
            status,
            Json(serde_json::json!({
                "error": error_type,
                "code": code,
                "message": message
            })),
        )
            .into_response()
    }
}
