//! Error types for PeerDesk services
//!
//! Provides a comprehensive error handling system with:
//! - One variant per rejected precondition (role, ownership, state, uniqueness, input)
//! - HTTP status code mapping
//! - Structured error responses
//! - Error codes for client handling

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

/// Error codes for machine-readable error identification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Validation errors (1xxx)
    ValidationError,
    PayloadTooLarge,

    // Authentication errors (2xxx)
    Unauthorized,
    ExpiredToken,

    // Authorization errors (3xxx)
    Forbidden,
    InvalidRole,

    // Resource errors (4xxx)
    NotFound,

    // Uniqueness errors (5xxx)
    AlreadyAssigned,
    AlreadyCompleted,
    AlreadyReviewed,
    SubmissionHasReviews,

    // State machine errors (6xxx)
    InvalidTransition,
    InvalidState,
    InvalidSubmissionState,

    // Database errors (7xxx)
    DatabaseError,
    ConnectionError,

    // External collaborator errors (8xxx)
    StorageError,
    UpstreamError,

    // Internal errors (9xxx)
    InternalError,
    ConfigurationError,
    SerializationError,
}

impl ErrorCode {
    /// Get the numeric code for this error
    pub fn as_code(&self) -> u16 {
        match self {
            ErrorCode::ValidationError => 1001,
            ErrorCode::PayloadTooLarge => 1002,

            ErrorCode::Unauthorized => 2001,
            ErrorCode::ExpiredToken => 2002,

            ErrorCode::Forbidden => 3001,
            ErrorCode::InvalidRole => 3002,

            ErrorCode::NotFound => 4001,

            ErrorCode::AlreadyAssigned => 5001,
            ErrorCode::AlreadyCompleted => 5002,
            ErrorCode::AlreadyReviewed => 5003,
            ErrorCode::SubmissionHasReviews => 5004,

            ErrorCode::InvalidTransition => 6001,
            ErrorCode::InvalidState => 6002,
            ErrorCode::InvalidSubmissionState => 6003,

            ErrorCode::DatabaseError => 7001,
            ErrorCode::ConnectionError => 7002,

            ErrorCode::StorageError => 8001,
            ErrorCode::UpstreamError => 8002,

            ErrorCode::InternalError => 9001,
            ErrorCode::ConfigurationError => 9002,
            ErrorCode::SerializationError => 9003,
        }
    }
}

/// Which precondition a rejected operation failed, so callers can render
/// an actionable message.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Precondition {
    Input,
    Authentication,
    Role,
    Ownership,
    Existence,
    Uniqueness,
    State,
}

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Validation errors
    #[error("Validation failed: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    #[error("Payload too large: {size} bytes exceeds limit of {limit} bytes")]
    PayloadTooLarge { size: usize, limit: usize },

    // Authentication errors
    #[error("Unauthorized: {message}")]
    Unauthorized { message: String },

    #[error("Token expired")]
    ExpiredToken,

    // Authorization errors
    #[error("Forbidden: {message}")]
    Forbidden {
        message: String,
        precondition: Precondition,
    },

    #[error("User {user_id} holds role '{role}', which cannot review")]
    InvalidRole { user_id: Uuid, role: String },

    // Resource errors
    #[error("Resource not found: {resource_type} with id {id}")]
    NotFound { resource_type: String, id: String },

    // Uniqueness errors
    #[error("Reviewer {reviewer_id} is already assigned to submission {submission_id}")]
    AlreadyAssigned {
        submission_id: Uuid,
        reviewer_id: Uuid,
    },

    #[error("Review {review_id} has already been completed")]
    AlreadyCompleted { review_id: Uuid },

    #[error("Reviewer {reviewer_id} has already reviewed submission {submission_id}")]
    AlreadyReviewed {
        submission_id: Uuid,
        reviewer_id: Uuid,
    },

    #[error("Submission {id} cannot be deleted while reviews reference it")]
    SubmissionHasReviews { id: Uuid },

    // State machine errors
    #[error("Invalid transition from '{from}' to '{to}'")]
    InvalidTransition { from: String, to: String },

    #[error("Invalid state: {message}")]
    InvalidState { message: String },

    #[error("Submission in status '{status}' does not accept reviews")]
    InvalidSubmissionState { status: String },

    // Database errors
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("Database connection error: {message}")]
    DatabaseConnection { message: String },

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    // External collaborator errors
    #[error("Manuscript storage error: {message}")]
    Storage { message: String },

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    // Internal errors
    #[error("Internal server error: {message}")]
    Internal { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // Generic
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Shorthand for a missing entity
    pub fn not_found(resource_type: &str, id: impl ToString) -> Self {
        AppError::NotFound {
            resource_type: resource_type.to_string(),
            id: id.to_string(),
        }
    }

    /// Shorthand for a role rejection
    pub fn forbidden(message: impl Into<String>) -> Self {
        AppError::Forbidden {
            message: message.into(),
            precondition: Precondition::Role,
        }
    }

    /// Shorthand for acting on something the actor does not own
    pub fn not_owner(message: impl Into<String>) -> Self {
        AppError::Forbidden {
            message: message.into(),
            precondition: Precondition::Ownership,
        }
    }

    /// Get the error code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Validation { .. } => ErrorCode::ValidationError,
            AppError::PayloadTooLarge { .. } => ErrorCode::PayloadTooLarge,
            AppError::Unauthorized { .. } => ErrorCode::Unauthorized,
            AppError::ExpiredToken => ErrorCode::ExpiredToken,
            AppError::Forbidden { .. } => ErrorCode::Forbidden,
            AppError::InvalidRole { .. } => ErrorCode::InvalidRole,
            AppError::NotFound { .. } => ErrorCode::NotFound,
            AppError::AlreadyAssigned { .. } => ErrorCode::AlreadyAssigned,
            AppError::AlreadyCompleted { .. } => ErrorCode::AlreadyCompleted,
            AppError::AlreadyReviewed { .. } => ErrorCode::AlreadyReviewed,
            AppError::SubmissionHasReviews { .. } => ErrorCode::SubmissionHasReviews,
            AppError::InvalidTransition { .. } => ErrorCode::InvalidTransition,
            AppError::InvalidState { .. } => ErrorCode::InvalidState,
            AppError::InvalidSubmissionState { .. } => ErrorCode::InvalidSubmissionState,
            AppError::Database(_) | AppError::Migration(_) => ErrorCode::DatabaseError,
            AppError::DatabaseConnection { .. } => ErrorCode::ConnectionError,
            AppError::Storage { .. } => ErrorCode::StorageError,
            AppError::HttpClient(_) => ErrorCode::UpstreamError,
            AppError::Internal { .. } => ErrorCode::InternalError,
            AppError::Configuration { .. } => ErrorCode::ConfigurationError,
            AppError::Serialization(_) => ErrorCode::SerializationError,
            AppError::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Which precondition failed, if this is a rejected operation rather than
    /// an infrastructure failure
    pub fn precondition(&self) -> Option<Precondition> {
        match self {
            AppError::Validation { .. } | AppError::PayloadTooLarge { .. } => {
                Some(Precondition::Input)
            }
            AppError::Unauthorized { .. } | AppError::ExpiredToken => {
                Some(Precondition::Authentication)
            }
            AppError::Forbidden { precondition, .. } => Some(*precondition),
            AppError::InvalidRole { .. } => Some(Precondition::Role),
            AppError::NotFound { .. } => Some(Precondition::Existence),
            AppError::AlreadyAssigned { .. }
            | AppError::AlreadyCompleted { .. }
            | AppError::AlreadyReviewed { .. }
            | AppError::SubmissionHasReviews { .. } => Some(Precondition::Uniqueness),
            AppError::InvalidTransition { .. }
            | AppError::InvalidState { .. }
            | AppError::InvalidSubmissionState { .. } => Some(Precondition::State),
            _ => None,
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            // 400 Bad Request
            AppError::Validation { .. } => StatusCode::BAD_REQUEST,

            // 401 Unauthorized
            AppError::Unauthorized { .. } | AppError::ExpiredToken => StatusCode::UNAUTHORIZED,

            // 403 Forbidden
            AppError::Forbidden { .. } | AppError::InvalidRole { .. } => StatusCode::FORBIDDEN,

            // 404 Not Found
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,

            // 409 Conflict
            AppError::AlreadyAssigned { .. }
            | AppError::AlreadyCompleted { .. }
            | AppError::AlreadyReviewed { .. }
            | AppError::SubmissionHasReviews { .. } => StatusCode::CONFLICT,

            // 413 Payload Too Large
            AppError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,

            // 422 Unprocessable Entity
            AppError::InvalidTransition { .. }
            | AppError::InvalidState { .. }
            | AppError::InvalidSubmissionState { .. } => StatusCode::UNPROCESSABLE_ENTITY,

            // 500 Internal Server Error
            AppError::Database(_)
            | AppError::DatabaseConnection { .. }
            | AppError::Migration(_)
            | AppError::Storage { .. }
            | AppError::Internal { .. }
            | AppError::Configuration { .. }
            | AppError::Serialization(_)
            | AppError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,

            // 502 Bad Gateway
            AppError::HttpClient(_) => StatusCode::BAD_GATEWAY,
        }
    }

    /// Check if this error should be logged at error level
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }

    /// Check if this error is a client error
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }
}

/// Structured error response for API
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetails,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetails {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub precondition: Option<Precondition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();
        let precondition = self.precondition();
        let message = self.to_string();

        if self.is_server_error() {
            tracing::error!(
                error = %message,
                code = ?code,
                status = status.as_u16(),
                "Server error"
            );
        } else if self.is_client_error() {
            tracing::warn!(
                error = %message,
                code = ?code,
                status = status.as_u16(),
                "Client error"
            );
        }

        let field = match self {
            AppError::Validation { field, .. } => field,
            _ => None,
        };

        let body = ErrorResponse {
            error: ErrorDetails {
                code,
                message,
                precondition,
                field,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Storage {
            message: err.to_string(),
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let field = errors.field_errors().keys().next().map(|k| k.to_string());
        AppError::Validation {
            message: errors.to_string(),
            field,
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        let message = rejection.body_text();
        let field = rejected_field(&message);
        AppError::Validation { message, field }
    }
}

/// Field named in a body deserialization failure, if any
fn rejected_field(message: &str) -> Option<String> {
    let (_, detail) = message.split_once("target type: ")?;
    if let Some((_, rest)) = detail.split_once("missing field `") {
        return rest.split('`').next().map(str::to_string);
    }
    let (path, _) = detail.split_once(": ")?;
    (!path.is_empty() && !path.contains(char::is_whitespace)).then(|| path.to_string())
}
