//! Error types for Questboard
//!
//! All errors in the application are converted to `AppError`,
//! which implements `IntoResponse` for proper HTTP error responses.
//! Business-rule violations carry the detail a caller needs to act on
//! (remaining cooldown hours, the roles required, the state found).

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::data::{ProgressStatus, QuestStatus};

/// Application-wide error type
#[derive(Debug, Error)]
pub enum AppError {
    /// Quest, progress row, template, or schedule absent (404)
    #[error("Resource not found")]
    NotFound,

    /// Quest summary status blocks acceptance (409)
    #[error("Quest is not available for acceptance")]
    NotAvailable { status: QuestStatus },

    /// Duplicate accept or duplicate team membership (409)
    #[error("{0}")]
    AlreadyActive(String),

    /// Rejection cooldown still running (429)
    #[error("You must wait {hours_left} more hours before attempting this quest again")]
    CooldownActive { hours_left: i64 },

    /// Role gate failed (403)
    #[error("You don't have the required roles for this quest")]
    MissingRole { required_role_ids: Vec<i64> },

    /// Lifecycle operation attempted from the wrong state (409)
    #[error("Quest progress is {actual}, expected {expected}")]
    InvalidState {
        expected: ProgressStatus,
        actual: ProgressStatus,
    },

    /// Actor identity missing from the request (401)
    #[error("Authentication required")]
    Unauthorized,

    /// Permission policy denied the operation (403)
    #[error("Access denied")]
    Forbidden,

    /// Validation error (400)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Storage backend failure (503 when retryable, else 500)
    #[error("Storage failure: {0}")]
    Storage(#[from] sqlx::Error),

    /// Configuration error (500)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal server error (500)
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

impl AppError {
    /// Stable machine-readable error kind
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::NotFound => "not_found",
            AppError::NotAvailable { .. } => "not_available",
            AppError::AlreadyActive(_) => "already_active",
            AppError::CooldownActive { .. } => "cooldown_active",
            AppError::MissingRole { .. } => "missing_role",
            AppError::InvalidState { .. } => "invalid_state",
            AppError::Unauthorized => "unauthorized",
            AppError::Forbidden => "forbidden",
            AppError::Validation(_) => "validation",
            AppError::Storage(_) => "storage",
            AppError::Config(_) => "config",
            AppError::Internal(_) => "internal",
        }
    }

    /// Whether the caller may retry the same request unchanged
    ///
    /// Only transient storage conditions qualify: pool exhaustion,
    /// I/O failures, and SQLite busy/locked.
    pub fn is_retryable(&self) -> bool {
        match self {
            AppError::Storage(sqlx::Error::PoolTimedOut) | AppError::Storage(sqlx::Error::Io(_)) => {
                true
            }
            AppError::Storage(sqlx::Error::Database(db_error)) => {
                db_error.code().is_some_and(|code| is_busy_code(&code))
            }
            _ => false,
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::NotAvailable { .. }
            | AppError::AlreadyActive(_)
            | AppError::InvalidState { .. } => StatusCode::CONFLICT,
            AppError::CooldownActive { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::MissingRole { .. } | AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Storage(_) if self.is_retryable() => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Storage(_) | AppError::Config(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

/// SQLITE_BUSY (5) or SQLITE_LOCKED (6), including their extended codes
fn is_busy_code(code: &str) -> bool {
    code.parse::<i32>().is_ok_and(|code| matches!(code & 0xff, 5 | 6))
}

impl IntoResponse for AppError {
    /// Convert error to HTTP response
    ///
    /// Maps each error variant to an HTTP status code and a JSON body
    /// of the form `{"error": ..., "code": ...}` plus any variant detail.
    fn into_response(self) -> Response {
        use axum::Json;

        let status = self.status_code();
        let error_type = self.kind();
        let error_message = match &self {
            AppError::Storage(error) => {
                tracing::error!(%error, "Storage failure");
                "Storage failure".to_string()
            }
            AppError::Internal(error) => {
                tracing::error!(%error, "Internal error");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        use crate::metrics::ERRORS_TOTAL;
        ERRORS_TOTAL.with_label_values(&[error_type]).inc();

        let mut body = serde_json::json!({
            "error": error_message,
            "code": error_type,
        });
        match &self {
            AppError::CooldownActive { hours_left } => {
                body["hours_left"] = serde_json::json!(hours_left);
            }
            AppError::MissingRole { required_role_ids } => {
                body["required_role_ids"] = serde_json::json!(required_role_ids);
            }
            AppError::InvalidState { expected, actual } => {
                body["expected"] = serde_json::json!(expected);
                body["actual"] = serde_json::json!(actual);
            }
            AppError::NotAvailable { status } => {
                body["status"] = serde_json::json!(status);
            }
            AppError::Storage(_) => {
                body["retryable"] = serde_json::json!(self.is_retryable());
            }
            _ => {}
        }

        (status, Json(body)).into_response()
    }
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cooldown_message_reports_hours() {
        let error = AppError::CooldownActive { hours_left: 23 };
        assert_eq!(
            error.to_string(),
            "You must wait 23 more hours before attempting this quest again"
        );
        assert_eq!(error.status_code(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[test]
    fn pool_timeout_is_retryable() {
        assert!(AppError::Storage(sqlx::Error::PoolTimedOut).is_retryable());
        assert!(!AppError::Storage(sqlx::Error::RowNotFound).is_retryable());
        assert!(!AppError::NotFound.is_retryable());
        assert_eq!(
            AppError::Storage(sqlx::Error::PoolTimedOut).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn extended_busy_and_locked_codes_are_retryable() {
        // SQLITE_BUSY_SNAPSHOT, SQLITE_LOCKED_SHAREDCACHE, SQLITE_LOCKED_VTAB
        for code in ["5", "6", "517", "262", "518"] {
            assert!(is_busy_code(code), "code {code}");
        }
        // SQLITE_CONSTRAINT and SQLITE_CONSTRAINT_UNIQUE
        for code in ["19", "2067", "", "busy"] {
            assert!(!is_busy_code(code), "code {code}");
        }
    }

    #[test]
    fn invalid_state_names_both_states() {
        let error = AppError::InvalidState {
            expected: ProgressStatus::Accepted,
            actual: ProgressStatus::Completed,
        };
        assert_eq!(error.to_string(), "Quest progress is completed, expected accepted");
        assert_eq!(error.kind(), "invalid_state");
    }
}
