//! Error types for Alexandria server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Wire-level error codes returned to API clients
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ErrorCode {
    Success = 0,
    Failure = 1,
    NotAuthorized = 2,
    DbFailure = 3,
    NoSuchRecord = 4,
    OutOfStock = 5,
    AlreadyReturned = 6,
    BadValue = 7,
    Duplicate = 8,
    InvalidExtension = 9,
    InvalidCapacity = 10,
    InventoryCorruption = 11,
}

/// Main application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Authorization failed: {0}")]
    Authorization(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    /// No copy of the book is currently available. Expected under normal
    /// operation; never retried automatically (no backorder semantics).
    #[error("No available copies for book {book_id}")]
    OutOfStock { book_id: i32 },

    /// The loan was already closed; closed loans are immutable.
    #[error("Loan {loan_id} is already returned")]
    AlreadyReturned { loan_id: i32 },

    #[error("Invalid extension: {0}")]
    InvalidExtension(String),

    #[error("Invalid capacity: {0}")]
    InvalidCapacity(String),

    /// The ledger and the open-loan set disagree for one book. Fatal for
    /// that book's counts, isolated from the rest of the system.
    #[error("Inventory corruption detected for book {book_id}")]
    InventoryCorruption { book_id: i32 },
}

/// Error response body
#[derive(Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub code: u32,
    pub error: String,
    pub message: String,
}

impl AppError {
    /// HTTP status and wire code for this error
    pub fn status_and_code(&self) -> (StatusCode, ErrorCode) {
        match self {
            AppError::Authentication(_) => (StatusCode::UNAUTHORIZED, ErrorCode::NotAuthorized),
            AppError::Authorization(_) => (StatusCode::FORBIDDEN, ErrorCode::NotAuthorized),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, ErrorCode::NoSuchRecord),
            AppError::Validation(_) => (StatusCode::BAD_REQUEST, ErrorCode::BadValue),
            AppError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, ErrorCode::DbFailure),
            AppError::Conflict(_) => (StatusCode::CONFLICT, ErrorCode::Duplicate),
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, ErrorCode::BadValue),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, ErrorCode::Failure),
            AppError::OutOfStock { .. } => (StatusCode::CONFLICT, ErrorCode::OutOfStock),
            AppError::AlreadyReturned { .. } => (StatusCode::CONFLICT, ErrorCode::AlreadyReturned),
            AppError::InvalidExtension(_) => (StatusCode::BAD_REQUEST, ErrorCode::InvalidExtension),
            AppError::InvalidCapacity(_) => (StatusCode::BAD_REQUEST, ErrorCode::InvalidCapacity),
            AppError::InventoryCorruption { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, ErrorCode::InventoryCorruption)
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let message = match &self {
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                "Database error".to_string()
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                "Internal server error".to_string()
            }
            AppError::InventoryCorruption { book_id } => {
                // Invariant violation. Must reach an operator, never be
                // silently repaired.
                tracing::error!(
                    book_id,
                    "inventory corruption: available_copies disagrees with open loans"
                );
                self.to_string()
            }
            other => other.to_string(),
        };

        let body = Json(ErrorResponse {
            code: code as u32,
            error: format!("{:?}", code),
            message,
        });

        (status, body).into_response()
    }
}

/// Result type alias for application operations
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_of_stock_maps_to_conflict() {
        let (status, code) = AppError::OutOfStock { book_id: 1 }.status_and_code();
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(code, ErrorCode::OutOfStock);
    }

    #[test]
    fn already_returned_maps_to_conflict() {
        let (status, code) = AppError::AlreadyReturned { loan_id: 9 }.status_and_code();
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(code, ErrorCode::AlreadyReturned);
    }

    #[test]
    fn invalid_inputs_map_to_bad_request() {
        let (status, _) = AppError::InvalidExtension("0 days".into()).status_and_code();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, _) = AppError::InvalidCapacity("below loaned count".into()).status_and_code();
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn corruption_is_a_server_error() {
        let (status, code) = AppError::InventoryCorruption { book_id: 3 }.status_and_code();
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(code, ErrorCode::InventoryCorruption);
    }
}
