//! Custom error types for the API service

use auth::{AuthError, FieldError};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use common::error::RepositoryError;
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Custom error type for the API service
#[derive(Error, Debug)]
pub enum ApiError {
    /// Missing or invalid session
    #[error("Unauthorized")]
    Unauthorized,

    /// Login with unknown user or wrong password
    #[error("{0}")]
    InvalidCredentials(String),

    /// Session owner acting on behalf of somebody else
    #[error("Forbidden")]
    Forbidden,

    /// Request body failed validation
    #[error("Validation failed")]
    Validation(Vec<FieldError>),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Unprocessable(String),

    /// Store outage or other server-side failure; details are only logged
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::UserNotFound | AuthError::BadPassword => {
                ApiError::InvalidCredentials(err.to_string())
            }
            AuthError::AlreadyExists => ApiError::Conflict(err.to_string()),
            AuthError::Validation(errors) => ApiError::Validation(errors),
            AuthError::Unauthenticated => ApiError::Unauthorized,
            AuthError::UserStore(inner) => ApiError::from(inner),
            AuthError::SessionCreationFailed(_) | AuthError::SessionStore(_) => {
                ApiError::Internal(err.to_string())
            }
        }
    }
}

impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound | RepositoryError::NoneFound => {
                ApiError::NotFound(err.to_string())
            }
            RepositoryError::AlreadyExists => ApiError::Conflict(err.to_string()),
            RepositoryError::SelfSubscription => ApiError::Unprocessable(err.to_string()),
            RepositoryError::BadPassword => ApiError::InvalidCredentials(err.to_string()),
            RepositoryError::Hashing(_) | RepositoryError::Database(_) => {
                ApiError::Internal(err.to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            ApiError::Validation(errors) => {
                let body = Json(json!({ "errors": errors }));
                return (StatusCode::UNPROCESSABLE_ENTITY, body).into_response();
            }
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
            ApiError::InvalidCredentials(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::Forbidden => (StatusCode::FORBIDDEN, "Forbidden".to_string()),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::Unprocessable(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg),
            ApiError::Internal(detail) => {
                error!("Request failed: {}", detail);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

/// Type alias for API results
pub type ApiResult<T> = Result<T, ApiError>;
