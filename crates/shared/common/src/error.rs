//! Unified error handling.
//!
//! Distinct failure kinds are kept as separate variants so they can be
//! logged and matched on, while the HTTP mapping collapses every propagation
//! and infrastructure fault into a single terminal response.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use domain::{DomainError, UserId};
use serde::Serialize;
use thiserror::Error;

/// Why a notification to another service did not go through.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NotifyError {
    /// The registry knows no live instance of the target service
    #[error("No instances of {0} available")]
    NoInstancesAvailable(String),

    /// The registry itself could not be queried
    #[error("Service discovery failed: {0}")]
    Discovery(String),

    /// Timeout, refused connection, DNS failure
    #[error("Transport failure: {0}")]
    TransportFailure(String),

    /// The target answered with a non-2xx status
    #[error("Remote service rejected the request with status {0}")]
    RemoteRejected(u16),
}

impl NotifyError {
    pub fn no_instances(service: impl Into<String>) -> Self {
        NotifyError::NoInstancesAvailable(service.into())
    }

    pub fn transport(msg: impl std::fmt::Display) -> Self {
        NotifyError::TransportFailure(msg.to_string())
    }

    pub fn discovery(msg: impl std::fmt::Display) -> Self {
        NotifyError::Discovery(msg.to_string())
    }
}

/// Application error types.
#[derive(Error, Debug)]
pub enum AppError {
    // Lifecycle
    #[error("Username {0} already exists")]
    DuplicateUsername(String),

    #[error("User {0} not found")]
    UserNotFound(String),

    #[error("Failed to propagate registration of user {user_id}: {source}")]
    RegistrationPropagationFailed { user_id: UserId, source: NotifyError },

    #[error("Failed to propagate dormancy of user {user_id}: {source}")]
    DormancyPropagationFailed { user_id: UserId, source: NotifyError },

    #[error(transparent)]
    Notify(#[from] NotifyError),

    // Validation
    #[error("{0}")]
    Validation(String),

    // External service errors
    #[cfg(feature = "database")]
    #[error("Database error")]
    Database(#[from] sea_orm::DbErr),

    // Internal
    #[error("Internal server error")]
    Internal(String),
}

/// Error response body for HTTP
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: String,
    message: String,
}

/// Message shown for every failure the caller cannot act on.
pub const TERMINAL_FAILURE_MESSAGE: &str = "The request could not be completed";

impl AppError {
    /// Internal failure kind, stable across releases; used for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::DuplicateUsername(_) => "duplicate_username",
            AppError::UserNotFound(_) => "user_not_found",
            AppError::RegistrationPropagationFailed { .. } => "registration_propagation_failed",
            AppError::DormancyPropagationFailed { .. } => "dormancy_propagation_failed",
            AppError::Notify(NotifyError::NoInstancesAvailable(_)) => "no_instances_available",
            AppError::Notify(NotifyError::Discovery(_)) => "discovery_failed",
            AppError::Notify(NotifyError::TransportFailure(_)) => "transport_failure",
            AppError::Notify(NotifyError::RemoteRejected(_)) => "remote_rejected",
            AppError::Validation(_) => "validation",
            #[cfg(feature = "database")]
            AppError::Database(_) => "database",
            AppError::Internal(_) => "internal",
        }
    }

    /// Whether the local change was applied but the Account service was not told.
    pub fn is_propagation_failure(&self) -> bool {
        matches!(
            self,
            AppError::RegistrationPropagationFailed { .. }
                | AppError::DormancyPropagationFailed { .. }
        )
    }

    /// Get error code for client
    pub fn code(&self) -> &'static str {
        match self {
            AppError::DuplicateUsername(_) => "CONFLICT",
            AppError::UserNotFound(_) => "NOT_FOUND",
            AppError::Validation(_) => "VALIDATION_ERROR",
            _ => "REQUEST_FAILED",
        }
    }

    /// Get HTTP status code
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::DuplicateUsername(_) => StatusCode::CONFLICT,
            AppError::UserNotFound(_) => StatusCode::NOT_FOUND,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get user-facing message (hides internal details)
    pub fn user_message(&self) -> String {
        match self {
            AppError::DuplicateUsername(_) => "Username already exists".to_string(),
            AppError::UserNotFound(_) => "User not found".to_string(),
            AppError::Validation(msg) => msg.clone(),
            _ => {
                tracing::error!(kind = self.kind(), error = %self, "Request failed");
                TERMINAL_FAILURE_MESSAGE.to_string()
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.code().to_string(),
                message: self.user_message(),
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<DomainError> for AppError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::Validation(msg) | DomainError::Password(msg) => AppError::Validation(msg),
            DomainError::Internal(msg) => AppError::Internal(msg),
        }
    }
}

/// Result type alias
pub type AppResult<T> = Result<T, AppError>;

/// Convenience constructors
impl AppError {
    pub fn duplicate_username(username: impl Into<String>) -> Self {
        AppError::DuplicateUsername(username.into())
    }

    pub fn user_not_found(username: impl Into<String>) -> Self {
        AppError::UserNotFound(username.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        AppError::Validation(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        AppError::Internal(msg.into())
    }
}
