use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::{json, Value};

use crate::config::RuntimeMode;

pub type AppResult<T> = Result<T, AppError>;

/// Stable machine-readable error codes carried in every error envelope.
pub mod codes {
    // Authentication
    pub const MISSING_TOKEN: &str = "AUTH_1001";
    pub const INVALID_TOKEN: &str = "AUTH_1002";
    pub const UNAUTHENTICATED: &str = "AUTH_1003";

    // Authorization
    pub const INSUFFICIENT_PERMISSIONS: &str = "AUTHZ_2001";
    pub const FORBIDDEN: &str = "AUTHZ_2002";

    // Validation
    pub const INVALID_INPUT: &str = "VAL_3001";
    pub const INVALID_UUID: &str = "VAL_3002";
    pub const INVALID_EMAIL: &str = "VAL_3003";
    pub const INVALID_PASSWORD: &str = "VAL_3004";
    pub const INVALID_SLUG: &str = "VAL_3005";
    pub const MISSING_REQUIRED_FIELD: &str = "VAL_3006";
    pub const PAYLOAD_TOO_LARGE: &str = "VAL_3007";

    // Resources
    pub const NOT_FOUND: &str = "RES_4001";
    pub const ALREADY_EXISTS: &str = "RES_4002";
    pub const CONFLICT: &str = "RES_4003";

    // Storage
    pub const DATABASE_ERROR: &str = "DB_5001";
    pub const FOREIGN_KEY_VIOLATION: &str = "DB_5002";
    pub const UNIQUE_VIOLATION: &str = "DB_5003";
    pub const CHECK_VIOLATION: &str = "DB_5004";

    // System
    pub const INTERNAL_SERVER_ERROR: &str = "SYS_9001";
    pub const SERVICE_UNAVAILABLE: &str = "SYS_9002";
}

/// Constraint class of a failed storage operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageErrorKind {
    UniqueViolation,
    ForeignKeyViolation,
    CheckViolation,
    NotNullViolation,
    Other,
}

#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    MissingToken(String),
    #[error("{0}")]
    InvalidToken(String),
    #[error("{0}")]
    Unauthenticated(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{message}")]
    InvalidInput { message: String, details: Option<Value> },
    #[error("{0}")]
    InvalidUuid(String),
    #[error("{0}")]
    InvalidEmail(String),
    #[error("{0}")]
    InvalidPassword(String),
    #[error("{0}")]
    InvalidSlug(String),
    #[error("{0}")]
    MissingField(String),
    #[error("{0}")]
    PayloadTooLarge(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    AlreadyExists(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{message}")]
    Storage {
        kind: StorageErrorKind,
        message: String,
        original: String,
    },
    #[error("permission check failed: {0}")]
    ResolutionFailed(String),
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("service unavailable: {0}")]
    Unavailable(String),
    #[error("internal server error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn missing_token(message: impl Into<String>) -> Self {
        Self::MissingToken(message.into())
    }

    pub fn invalid_token(message: impl Into<String>) -> Self {
        Self::InvalidToken(message.into())
    }

    pub fn unauthenticated(message: impl Into<String>) -> Self {
        Self::Unauthenticated(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
            details: None,
        }
    }

    pub fn invalid_input_with(message: impl Into<String>, details: Value) -> Self {
        Self::InvalidInput {
            message: message.into(),
            details: Some(details),
        }
    }

    pub fn invalid_uuid(message: impl Into<String>) -> Self {
        Self::InvalidUuid(message.into())
    }

    pub fn invalid_email(message: impl Into<String>) -> Self {
        Self::InvalidEmail(message.into())
    }

    pub fn invalid_password(message: impl Into<String>) -> Self {
        Self::InvalidPassword(message.into())
    }

    pub fn invalid_slug(message: impl Into<String>) -> Self {
        Self::InvalidSlug(message.into())
    }

    pub fn missing_field(message: impl Into<String>) -> Self {
        Self::MissingField(message.into())
    }

    pub fn payload_too_large(message: impl Into<String>) -> Self {
        Self::PayloadTooLarge(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn already_exists(message: impl Into<String>) -> Self {
        Self::AlreadyExists(message.into())
    }

    pub fn storage(message: impl Into<String>) -> Self {
        let message = message.into();
        Self::Storage {
            kind: StorageErrorKind::Other,
            original: message.clone(),
            message,
        }
    }

    pub fn resolution_failed(message: impl Into<String>) -> Self {
        Self::ResolutionFailed(message.into())
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::MissingToken(_) => codes::MISSING_TOKEN,
            AppError::InvalidToken(_) => codes::INVALID_TOKEN,
            AppError::Unauthenticated(_) => codes::UNAUTHENTICATED,
            AppError::Forbidden(_) => codes::INSUFFICIENT_PERMISSIONS,
            AppError::InvalidInput { .. } => codes::INVALID_INPUT,
            AppError::InvalidUuid(_) => codes::INVALID_UUID,
            AppError::InvalidEmail(_) => codes::INVALID_EMAIL,
            AppError::InvalidPassword(_) => codes::INVALID_PASSWORD,
            AppError::InvalidSlug(_) => codes::INVALID_SLUG,
            AppError::MissingField(_) => codes::MISSING_REQUIRED_FIELD,
            AppError::PayloadTooLarge(_) => codes::PAYLOAD_TOO_LARGE,
            AppError::NotFound(_) => codes::NOT_FOUND,
            AppError::AlreadyExists(_) => codes::ALREADY_EXISTS,
            AppError::Conflict(_) => codes::CONFLICT,
            AppError::Storage { kind, .. } => match kind {
                StorageErrorKind::UniqueViolation => codes::UNIQUE_VIOLATION,
                StorageErrorKind::ForeignKeyViolation => codes::FOREIGN_KEY_VIOLATION,
                StorageErrorKind::CheckViolation => codes::CHECK_VIOLATION,
                StorageErrorKind::NotNullViolation => codes::MISSING_REQUIRED_FIELD,
                StorageErrorKind::Other => codes::DATABASE_ERROR,
            },
            AppError::ResolutionFailed(_) => codes::DATABASE_ERROR,
            AppError::Configuration(_) => codes::INTERNAL_SERVER_ERROR,
            AppError::Unavailable(_) => codes::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => codes::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::MissingToken(_) | AppError::InvalidToken(_) | AppError::Unauthenticated(_) => {
                StatusCode::UNAUTHORIZED
            }
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::InvalidInput { .. }
            | AppError::InvalidUuid(_)
            | AppError::InvalidEmail(_)
            | AppError::InvalidPassword(_)
            | AppError::InvalidSlug(_)
            | AppError::MissingField(_) => StatusCode::BAD_REQUEST,
            AppError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::AlreadyExists(_) | AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Storage { kind, .. } => match kind {
                StorageErrorKind::UniqueViolation => StatusCode::CONFLICT,
                StorageErrorKind::ForeignKeyViolation
                | StorageErrorKind::CheckViolation
                | StorageErrorKind::NotNullViolation => StatusCode::BAD_REQUEST,
                StorageErrorKind::Other => StatusCode::INTERNAL_SERVER_ERROR,
            },
            AppError::ResolutionFailed(_) | AppError::Configuration(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            AppError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Transient failures a caller may retry with backoff.
    pub fn is_retryable(&self) -> bool {
        matches!(self.code(), codes::SERVICE_UNAVAILABLE | codes::DATABASE_ERROR)
    }

    pub fn is_unique_violation(&self) -> bool {
        matches!(
            self,
            AppError::Storage {
                kind: StorageErrorKind::UniqueViolation,
                ..
            }
        )
    }

    fn details(&self, mode: RuntimeMode) -> Option<Value> {
        match self {
            AppError::InvalidInput { details, .. } => details.clone(),
            AppError::Storage { original, .. } if !mode.is_production() => Some(json!({ "originalError": original })),
            _ => None,
        }
    }

    /// Envelope sent to the client. Production drops 5xx messages and raw
    /// store errors.
    pub fn body(&self, mode: RuntimeMode) -> ErrorResponse {
        let code = self.code();
        if self.status().is_server_error() && mode.is_production() {
            return ErrorResponse {
                error: "Internal server error".to_string(),
                code,
                details: None,
            };
        }
        ErrorResponse {
            error: self.to_string(),
            code,
            details: self.details(mode),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();

        if status.is_server_error() {
            tracing::error!(code, error = ?self, "request failed");
        } else {
            tracing::debug!(code, error = %self, "request rejected");
        }

        let payload = self.body(RuntimeMode::current());
        (status, Json(payload)).into_response()
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db_err) => {
                let (kind, message) = match db_err.kind() {
                    sqlx::error::ErrorKind::UniqueViolation => (
                        StorageErrorKind::UniqueViolation,
                        "A record with this value already exists",
                    ),
                    sqlx::error::ErrorKind::ForeignKeyViolation => (
                        StorageErrorKind::ForeignKeyViolation,
                        "Referenced record does not exist",
                    ),
                    sqlx::error::ErrorKind::CheckViolation => (
                        StorageErrorKind::CheckViolation,
                        "Value does not meet constraints",
                    ),
                    sqlx::error::ErrorKind::NotNullViolation => (
                        StorageErrorKind::NotNullViolation,
                        "Required field is missing",
                    ),
                    _ => (StorageErrorKind::Other, "Database operation failed"),
                };
                AppError::Storage {
                    kind,
                    message: message.to_string(),
                    original: db_err.message().to_string(),
                }
            }
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                AppError::Unavailable(err.to_string())
            }
            _ => AppError::Storage {
                kind: StorageErrorKind::Other,
                message: "Database operation failed".to_string(),
                original: err.to_string(),
            },
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(value: anyhow::Error) -> Self {
        Self::Internal(value.to_string())
    }
}
