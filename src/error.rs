use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error;
use validator::ValidationErrors;

use crate::{
    dao::storage::StorageError,
    games::{roster::RosterError, runner::GameError},
};

/// Errors that can occur in service layer operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// A store call failed while the device is known to be offline.
    #[error("{0}")]
    Offline(String),
    /// Storage backend is unavailable.
    #[error("storage unavailable")]
    Unavailable(#[source] StorageError),
    /// Application is running in degraded mode without storage.
    #[error("storage unavailable (degraded mode)")]
    Degraded,
    /// Unauthorized access attempt.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// Invalid input provided by the client.
    #[error("{0}")]
    InvalidInput(String),
    /// Operation cannot be performed in the current state.
    #[error("{0}")]
    InvalidState(String),
    /// Requested resource was not found.
    #[error("{0}")]
    NotFound(String),
    /// The request clashes with data owned by someone else.
    #[error("{0}")]
    Conflict(String),
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        ServiceError::Unavailable(err)
    }
}

impl From<GameError> for ServiceError {
    fn from(err: GameError) -> Self {
        match err {
            GameError::InvalidCommand { .. } => ServiceError::InvalidState(err.to_string()),
            GameError::PadOutOfRange(_) => ServiceError::InvalidInput(err.to_string()),
            GameError::Rejected(message) => ServiceError::InvalidState(message),
            GameError::Stopped => ServiceError::NotFound("No game is running at this table".into()),
        }
    }
}

impl From<RosterError> for ServiceError {
    fn from(err: RosterError) -> Self {
        match err {
            RosterError::Locked => ServiceError::InvalidState(err.to_string()),
            RosterError::UnknownPlayer(_) => ServiceError::NotFound(err.to_string()),
            RosterError::Duplicate(_) => ServiceError::Conflict(err.to_string()),
        }
    }
}

impl From<ValidationErrors> for AppError {
    fn from(err: ValidationErrors) -> Self {
        AppError::BadRequest(format!("validation failed: {}", err))
    }
}

/// Application-level errors that are converted to HTTP responses.
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad request with invalid input.
    #[error("{0}")]
    BadRequest(String),
    /// Unauthorized access attempt.
    #[error("{0}")]
    Unauthorized(String),
    /// Requested resource not found.
    #[error("{0}")]
    NotFound(String),
    /// Conflict with current state.
    #[error("{0}")]
    Conflict(String),
    /// Service unavailable, degraded or offline.
    #[error("{0}")]
    ServiceUnavailable(String),
    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Offline(message) => AppError::ServiceUnavailable(message),
            ServiceError::Unavailable(source @ StorageError::Corrupt { .. }) => {
                AppError::Internal(source.to_string())
            }
            ServiceError::Unavailable(source) => AppError::ServiceUnavailable(source.to_string()),
            ServiceError::Degraded => {
                AppError::ServiceUnavailable("storage unavailable (degraded mode)".into())
            }
            ServiceError::Unauthorized(message) => AppError::Unauthorized(message),
            ServiceError::InvalidInput(message) => AppError::BadRequest(message),
            ServiceError::InvalidState(message) | ServiceError::Conflict(message) => {
                AppError::Conflict(message)
            }
            ServiceError::NotFound(message) => AppError::NotFound(message),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let payload = Json(ErrorBody {
            message: self.to_string(),
        });

        (status, payload).into_response()
    }
}
