use crate::db::errors::DbError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum Error {
    /// No owner identity on the request
    #[error("Not authenticated")]
    Unauthenticated { message: Option<String> },

    /// Zero or more than one selection mode supplied
    #[error("{message}")]
    AmbiguousSelection { message: String },

    /// Time range with start after end
    #[error("Invalid time range: start {start} is after end {end}")]
    InvalidRange {
        start: chrono::DateTime<chrono::Utc>,
        end: chrono::DateTime<chrono::Utc>,
    },

    /// Selection resolved to an empty record set and empty receipts are disabled
    #[error("No records matched the selection")]
    NoRecords,

    /// Receipt signature did not verify against its stored content
    #[error("Signature verification failed for receipt {receipt_id}")]
    InvalidSignature { receipt_id: String },

    /// Requested resource not found (or owned by someone else)
    #[error("{resource} with ID {id} not found")]
    NotFound { resource: String, id: String },

    /// Generic internal service error
    #[error("Failed to {operation}")]
    Internal { operation: String },

    /// Database operation error
    #[error(transparent)]
    Database(#[from] DbError),

    /// Unexpected error with full context chain
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::Unauthenticated { .. } => StatusCode::UNAUTHORIZED,
            Error::AmbiguousSelection { .. } => StatusCode::BAD_REQUEST,
            Error::InvalidRange { .. } => StatusCode::BAD_REQUEST,
            Error::NoRecords => StatusCode::BAD_REQUEST,
            Error::InvalidSignature { .. } => StatusCode::BAD_REQUEST,
            Error::NotFound { .. } => StatusCode::NOT_FOUND,
            Error::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Database(db_err) => match db_err {
                DbError::NotFound => StatusCode::NOT_FOUND,
                DbError::UniqueViolation { .. } => StatusCode::CONFLICT,
                DbError::ForeignKeyViolation { .. } => StatusCode::BAD_REQUEST,
                DbError::CheckViolation { .. } => StatusCode::BAD_REQUEST,
                DbError::Timeout => StatusCode::SERVICE_UNAVAILABLE,
                DbError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
                DbError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Error::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable tag for the error body. Clients branch on
    /// this, so variants map to fixed strings.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Unauthenticated { .. } => "unauthenticated",
            Error::AmbiguousSelection { .. } => "ambiguous_selection",
            Error::InvalidRange { .. } => "invalid_range",
            Error::NoRecords => "no_records",
            Error::InvalidSignature { .. } => "invalid_signature",
            Error::NotFound { .. } => "not_found",
            Error::Internal { .. } => "internal",
            Error::Database(db_err) => match db_err {
                DbError::NotFound => "not_found",
                DbError::UniqueViolation { .. } => "conflict",
                DbError::ForeignKeyViolation { .. } | DbError::CheckViolation { .. } => {
                    "bad_request"
                }
                DbError::Timeout => "store_timeout",
                DbError::Unavailable(_) => "store_unavailable",
                DbError::Other(_) => "internal",
            },
            Error::Other(_) => "internal",
        }
    }

    /// Returns a user-safe error message, without leaking internal implementation details
    pub fn user_message(&self) -> String {
        match self {
            Error::Unauthenticated { message } => message
                .clone()
                .unwrap_or_else(|| "Authentication required".to_string()),
            Error::AmbiguousSelection { message } => message.clone(),
            Error::InvalidRange { start, end } => {
                format!("Invalid time range: start {start} is after end {end}")
            }
            Error::NoRecords => "No records matched the selection".to_string(),
            Error::InvalidSignature { receipt_id } => {
                format!("Signature verification failed for receipt {receipt_id}")
            }
            Error::NotFound { resource, id } => {
                format!("{resource} with ID {id} not found")
            }
            Error::Internal { .. } => "Internal server error".to_string(),
            Error::Database(db_err) => match db_err {
                DbError::NotFound => "Resource not found".to_string(),
                DbError::UniqueViolation { .. } => "Resource already exists".to_string(),
                DbError::ForeignKeyViolation { .. } => {
                    "Invalid reference to related resource".to_string()
                }
                DbError::CheckViolation { .. } => "Invalid data provided".to_string(),
                DbError::Timeout => "Store operation timed out, retry the request".to_string(),
                DbError::Unavailable(_) => "Store temporarily unavailable".to_string(),
                DbError::Other(_) => "Database error occurred".to_string(),
            },
            Error::Other(_) => "Internal server error".to_string(),
        }
    }
}

impl From<crate::receipts::selector::SelectionError> for Error {
    fn from(err: crate::receipts::selector::SelectionError) -> Self {
        use crate::receipts::selector::SelectionError;
        match err {
            SelectionError::Ambiguous(message) => Error::AmbiguousSelection { message },
            SelectionError::InvalidRange { start, end } => Error::InvalidRange { start, end },
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        // Log full error details for debugging - different log levels based on severity
        match &self {
            Error::Database(DbError::Other(_)) | Error::Internal { .. } | Error::Other(_) => {
                tracing::error!("Internal service error: {:#}", self);
            }
            Error::Database(DbError::Timeout) | Error::Database(DbError::Unavailable(_)) => {
                tracing::warn!("Store availability error: {}", self);
            }
            Error::Database(_) => {
                tracing::warn!("Database constraint error: {}", self);
            }
            Error::Unauthenticated { .. } => {
                tracing::info!("Authorization error: {}", self);
            }
            Error::InvalidSignature { .. } => {
                tracing::warn!("Verification failure: {}", self);
            }
            Error::AmbiguousSelection { .. }
            | Error::InvalidRange { .. }
            | Error::NoRecords
            | Error::NotFound { .. } => {
                tracing::debug!("Client error: {}", self);
            }
        }

        let body = json!({
            "kind": self.kind(),
            "message": self.user_message(),
        });

        (self.status_code(), axum::response::Json(body)).into_response()
    }
}

/// Type alias for service operation results
pub type Result<T> = std::result::Result<T, Error>;
