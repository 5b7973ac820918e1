//! Error types shared by the service and HTTP layers.

use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error;

use crate::dao::storage::StorageError;

/// Errors that can occur in service layer operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Storage backend is unavailable.
    #[error("storage unavailable")]
    Unavailable(#[source] StorageError),
    /// Application is running in degraded mode without storage.
    #[error("storage unavailable (degraded mode)")]
    Degraded,
    /// Invalid input provided by the client.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Operation conflicts with the current lifecycle state.
    #[error("conflict: {0}")]
    Conflict(String),
    /// Requested resource was not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// The student already has a recorded vote for this poll.
    #[error("duplicate vote")]
    AlreadyVoted,
    /// The sender exceeded the chat rate limit.
    #[error("rate limited")]
    RateLimited,
    /// The student was removed by the teacher.
    #[error("kicked")]
    Kicked,
}

impl ServiceError {
    /// The message shown to end users for this error.
    ///
    /// These strings are part of the client contract and must stay stable.
    pub fn user_message(&self) -> String {
        match self {
            Self::Unavailable(_) | Self::Degraded => {
                "Database unavailable. Please try again.".into()
            }
            Self::InvalidInput(message)
            | Self::Conflict(message)
            | Self::NotFound(message) => message.clone(),
            Self::AlreadyVoted => "You already voted for this question.".into(),
            Self::RateLimited => "You're sending messages too fast. Please slow down.".into(),
            Self::Kicked => "You have been removed by the teacher.".into(),
        }
    }
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        if err.is_duplicate() {
            ServiceError::AlreadyVoted
        } else {
            ServiceError::Unavailable(err)
        }
    }
}

/// Application-level errors that are converted to HTTP responses.
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad request with invalid input.
    #[error("bad request: {0}")]
    BadRequest(String),
    /// Requested resource not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// Conflict with current state.
    #[error("conflict: {0}")]
    Conflict(String),
    /// Service unavailable or degraded.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Unavailable(source) => AppError::ServiceUnavailable(source.to_string()),
            ServiceError::Degraded => AppError::ServiceUnavailable("degraded mode".into()),
            ServiceError::InvalidInput(message) => AppError::BadRequest(message),
            ServiceError::Conflict(message) => AppError::Conflict(message),
            ServiceError::AlreadyVoted => {
                AppError::Conflict("You already voted for this question.".into())
            }
            ServiceError::NotFound(message) => AppError::NotFound(message),
            ServiceError::RateLimited => {
                AppError::Conflict("You're sending messages too fast. Please slow down.".into())
            }
            ServiceError::Kicked => {
                AppError::Conflict("You have been removed by the teacher.".into())
            }
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
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        };

        let payload = Json(ErrorBody {
            message: self.to_string(),
        });

        (status, payload).into_response()
    }
}
