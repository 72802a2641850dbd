//! Error handling module for the favs backend.
//!
//! `AppError` is the uniform status every repository, adapter and usecase call
//! returns. The HTTP layer maps it to a status code through a fixed table.

use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

/// Error codes as constants to avoid stringly-typed errors.
pub mod codes {
    pub const BAD_REQUEST: &str = "BAD_REQUEST";
    pub const NOT_FOUND: &str = "NOT_FOUND";
    pub const UNAUTHORIZED: &str = "UNAUTHORIZED";
    pub const FORBIDDEN: &str = "FORBIDDEN";
    pub const INTERNAL_ERROR: &str = "INTERNAL_ERROR";
    pub const ALREADY_EXISTS: &str = "ALREADY_EXISTS";
    pub const INVALID_CREDENTIALS: &str = "INVALID_CREDENTIALS";
    pub const INVALID_TOKEN: &str = "INVALID_TOKEN";
}

/// Application error type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppError {
    /// Malformed input
    BadRequest(String),
    /// Resource not found
    NotFound(String),
    /// Authentication required
    Unauthorized(String),
    /// Authenticated but not allowed (purchase gate, bad callback signature)
    Forbidden(String),
    /// Storage or provider failure
    Internal(String),
    /// Unique key already taken
    AlreadyExists(String),
    /// Password mismatch
    InvalidCredentials(String),
    /// Activation code or token mismatch
    InvalidToken(String),
}

impl AppError {
    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Internal(_)
            | AppError::AlreadyExists(_)
            | AppError::InvalidCredentials(_)
            | AppError::InvalidToken(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::BadRequest(_) => codes::BAD_REQUEST,
            AppError::NotFound(_) => codes::NOT_FOUND,
            AppError::Unauthorized(_) => codes::UNAUTHORIZED,
            AppError::Forbidden(_) => codes::FORBIDDEN,
            AppError::Internal(_) => codes::INTERNAL_ERROR,
            AppError::AlreadyExists(_) => codes::ALREADY_EXISTS,
            AppError::InvalidCredentials(_) => codes::INVALID_CREDENTIALS,
            AppError::InvalidToken(_) => codes::INVALID_TOKEN,
        }
    }

    /// Get the error message.
    pub fn message(&self) -> &str {
        match self {
            AppError::BadRequest(msg)
            | AppError::NotFound(msg)
            | AppError::Unauthorized(msg)
            | AppError::Forbidden(msg)
            | AppError::Internal(msg)
            | AppError::AlreadyExists(msg)
            | AppError::InvalidCredentials(msg)
            | AppError::InvalidToken(msg) => msg,
        }
    }

    /// Response body for this error.
    pub fn to_status(&self) -> Status {
        Status {
            code: self.error_code().to_string(),
            message: self.message().to_string(),
        }
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.error_code(), self.message())
    }
}

impl std::error::Error for AppError {}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        tracing::error!("Database error: {:?}", err);
        AppError::Internal(format!("Database error: {}", err))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        tracing::error!("JSON error: {:?}", err);
        AppError::Internal(format!("JSON error: {}", err))
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        tracing::error!("Outbound request error: {:?}", err);
        AppError::Internal(format!("Outbound request error: {}", err))
    }
}

impl From<redis::RedisError> for AppError {
    fn from(err: redis::RedisError) -> Self {
        tracing::error!("Cache error: {:?}", err);
        AppError::Internal(format!("Cache error: {}", err))
    }
}

impl From<deadpool_redis::PoolError> for AppError {
    fn from(err: deadpool_redis::PoolError) -> Self {
        tracing::error!("Cache pool error: {:?}", err);
        AppError::Internal(format!("Cache pool error: {}", err))
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

/// Uniform status envelope returned on every failed call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Status {
    pub code: String,
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(code = self.error_code(), "{}", self.message());
        }
        (status, Json(self.to_status())).into_response()
    }
}

/// Wrapper for the auth resource, which answers every failure with 400.
pub struct AuthFailure(pub AppError);

impl From<AppError> for AuthFailure {
    fn from(err: AppError) -> Self {
        AuthFailure(err)
    }
}

impl IntoResponse for AuthFailure {
    fn into_response(self) -> Response {
        (StatusCode::BAD_REQUEST, Json(self.0.to_status())).into_response()
    }
}
