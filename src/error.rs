// HTTP API Error Types
use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};
use thiserror::Error;

use crate::query::QueryError;
use crate::storage::StorageError;

/// Every failure the request pipeline can surface to a client.
///
/// Startup code only ever produces `MissingConfiguration`; everything else is
/// recovered at the request boundary and rendered as `{ code, message }`.
#[derive(Debug, Error)]
pub enum WarpError {
    #[error("{0} must be set")]
    MissingConfiguration(String),

    #[error("Invalid API Key")]
    InvalidApiKey,

    #[error("{0}")]
    ForbiddenOperation(String),

    #[error("Model not found")]
    ModelNotFound,

    #[error("Function not found")]
    FunctionNotFound,

    #[error("Queue not found")]
    QueueNotFound,

    #[error("{0}")]
    InvalidSessionToken(String),

    #[error("{0}")]
    InvalidCredentials(String),

    #[error("Username already taken")]
    UsernameTaken,

    #[error("Email already taken")]
    EmailTaken,

    #[error("Too many requests")]
    TooManyRequests,

    #[error("{0}")]
    InvalidParameter(String),

    #[error("{0}")]
    ObjectNotFound(String),

    #[error("{0}")]
    Internal(String),
}

impl WarpError {
    pub fn forbidden(message: impl Into<String>) -> Self {
        WarpError::ForbiddenOperation(message.into())
    }

    pub fn invalid_session(message: impl Into<String>) -> Self {
        WarpError::InvalidSessionToken(message.into())
    }

    pub fn invalid_credentials(message: impl Into<String>) -> Self {
        WarpError::InvalidCredentials(message.into())
    }

    pub fn invalid_parameter(message: impl Into<String>) -> Self {
        WarpError::InvalidParameter(message.into())
    }

    /// Get HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            WarpError::MissingConfiguration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            WarpError::InvalidApiKey => StatusCode::UNAUTHORIZED,
            WarpError::ForbiddenOperation(_) => StatusCode::FORBIDDEN,
            WarpError::ModelNotFound => StatusCode::NOT_FOUND,
            WarpError::FunctionNotFound => StatusCode::NOT_FOUND,
            WarpError::QueueNotFound => StatusCode::NOT_FOUND,
            WarpError::InvalidSessionToken(_) => StatusCode::UNAUTHORIZED,
            WarpError::InvalidCredentials(_) => StatusCode::UNAUTHORIZED,
            WarpError::UsernameTaken => StatusCode::CONFLICT,
            WarpError::EmailTaken => StatusCode::CONFLICT,
            WarpError::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,
            WarpError::InvalidParameter(_) => StatusCode::BAD_REQUEST,
            WarpError::ObjectNotFound(_) => StatusCode::NOT_FOUND,
            WarpError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get error code for client handling
    pub fn error_code(&self) -> &'static str {
        match self {
            WarpError::MissingConfiguration(_) => "MissingConfiguration",
            WarpError::InvalidApiKey => "InvalidAPIKey",
            WarpError::ForbiddenOperation(_) => "ForbiddenOperation",
            WarpError::ModelNotFound => "ModelNotFound",
            WarpError::FunctionNotFound => "FunctionNotFound",
            WarpError::QueueNotFound => "QueueNotFound",
            WarpError::InvalidSessionToken(_) => "InvalidSessionToken",
            WarpError::InvalidCredentials(_) => "InvalidCredentials",
            WarpError::UsernameTaken => "UsernameTaken",
            WarpError::EmailTaken => "EmailTaken",
            WarpError::TooManyRequests => "TooManyRequests",
            WarpError::InvalidParameter(_) => "InvalidParameter",
            WarpError::ObjectNotFound(_) => "ObjectNotFound",
            WarpError::Internal(_) => "InternalServerError",
        }
    }

    /// Convert to JSON response body
    pub fn to_json(&self) -> Value {
        json!({
            "code": self.error_code(),
            "message": self.to_string(),
        })
    }
}

// Collaborator failures never leak their detail to clients
impl From<QueryError> for WarpError {
    fn from(err: QueryError) -> Self {
        match err {
            QueryError::NotFound(msg) => WarpError::ObjectNotFound(msg),
            QueryError::Filter(e) => WarpError::invalid_parameter(e.to_string()),
            QueryError::ConnectionError(msg) => {
                tracing::error!("Database connection error: {}", msg);
                WarpError::Internal("Database temporarily unavailable".to_string())
            }
            QueryError::Sqlx(sqlx_err) => {
                tracing::error!("SQLx error: {}", sqlx_err);
                WarpError::Internal("Database error occurred".to_string())
            }
            QueryError::Decode(e) => {
                tracing::error!("Row decode error: {}", e);
                WarpError::Internal("An error occurred while processing your request".to_string())
            }
        }
    }
}

impl From<StorageError> for WarpError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::InvalidKey(key) => {
                WarpError::invalid_parameter(format!("Invalid file key: {}", key))
            }
            StorageError::Io { action, source } => {
                tracing::error!("Storage error ({}): {}", action, source);
                WarpError::Internal(format!("Could not {}", action))
            }
        }
    }
}

// Automatic HTTP response conversion for Axum
impl IntoResponse for WarpError {
    fn into_response(self) -> axum::response::Response {
        (self.status_code(), Json(self.to_json())).into_response()
    }
}
