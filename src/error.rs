use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use serde::Serialize;
use thiserror::Error;

use crate::ledger::LedgerError;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: &'static str,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    fn code(&self) -> &'static str {
        match self {
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Unauthorized(_) => "UNAUTHORIZED",
            AppError::Forbidden(_) => "FORBIDDEN",
            AppError::Conflict(_) => "CONFLICT",
            AppError::BadRequest(_) => "BAD_REQUEST",
            AppError::Ledger(LedgerError::InsufficientBalance { .. })
            | AppError::Ledger(LedgerError::BalanceUnderflow { .. })
            | AppError::Ledger(LedgerError::AllocationTooSmall { .. }) => "BALANCE_CONFLICT",
            AppError::Ledger(LedgerError::OverlappingLeave { .. }) => "LEAVE_OVERLAP",
            AppError::Ledger(LedgerError::UnknownStatus(_)) => "INTERNAL_SERVER_ERROR",
            AppError::Ledger(_) => "INVALID_INPUT",
            AppError::Database(sqlx::Error::RowNotFound) => "NOT_FOUND",
            AppError::Database(_) | AppError::Internal(_) => "INTERNAL_SERVER_ERROR",
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Ledger(LedgerError::InsufficientBalance { .. })
            | AppError::Ledger(LedgerError::BalanceUnderflow { .. })
            | AppError::Ledger(LedgerError::AllocationTooSmall { .. })
            | AppError::Ledger(LedgerError::OverlappingLeave { .. }) => StatusCode::CONFLICT,
            // a stored value we can't read back is our fault, not the caller's
            AppError::Ledger(LedgerError::UnknownStatus(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Ledger(_) => StatusCode::BAD_REQUEST,
            AppError::Database(sqlx::Error::RowNotFound) => StatusCode::NOT_FOUND,
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let error = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "Internal server error");
            "Internal Server Error".to_string()
        } else if let AppError::Database(sqlx::Error::RowNotFound) = self {
            "Resource not found".to_string()
        } else {
            self.to_string()
        };

        HttpResponse::build(status).json(ErrorResponse {
            error,
            code: self.code(),
        })
    }
}

/// MySQL reports unique key violations as SQLSTATE 23000.
pub fn is_duplicate_key(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("23000"))
}
