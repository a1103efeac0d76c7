// Error taxonomy for ledger operations and its HTTP mapping

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::storage::StorageError;

/// Every terminal outcome of a ledger operation other than success.
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("market {0} not found")]
    MarketNotFound(u64),

    #[error("no position for market {0}")]
    PositionNotFound(u64),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    InvalidState(String),

    #[error("insufficient balance: {balance} < {requested}")]
    InsufficientFunds { balance: f64, requested: f64 },

    #[error("winnings for market {0} already claimed")]
    AlreadyClaimed(u64),

    #[error("no winnings to claim for market {0}")]
    NoWinnings(u64),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Stable classification callers map to an external status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    BadRequest,
    Conflict,
    Internal,
}

impl LedgerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LedgerError::MarketNotFound(_) | LedgerError::PositionNotFound(_) => ErrorKind::NotFound,
            LedgerError::Validation(_)
            | LedgerError::InsufficientFunds { .. }
            | LedgerError::NoWinnings(_) => ErrorKind::BadRequest,
            LedgerError::InvalidState(_) | LedgerError::AlreadyClaimed(_) => ErrorKind::Conflict,
            LedgerError::Storage(_) | LedgerError::Internal(_) => ErrorKind::Internal,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self.kind() {
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::BadRequest => StatusCode::BAD_REQUEST,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for LedgerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        // Storage internals stay in the logs
        let message = match self.kind() {
            ErrorKind::Internal => {
                tracing::error!(error = %self, "internal ledger failure");
                "internal error".to_string()
            }
            _ => self.to_string(),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

pub type Result<T, E = LedgerError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds() {
        assert_eq!(LedgerError::MarketNotFound(1).kind(), ErrorKind::NotFound);
        assert_eq!(LedgerError::PositionNotFound(1).kind(), ErrorKind::NotFound);
        assert_eq!(LedgerError::Validation("x".into()).kind(), ErrorKind::BadRequest);
        assert_eq!(
            LedgerError::InsufficientFunds { balance: 1.0, requested: 2.0 }.kind(),
            ErrorKind::BadRequest
        );
        assert_eq!(LedgerError::NoWinnings(1).kind(), ErrorKind::BadRequest);
        assert_eq!(LedgerError::InvalidState("x".into()).kind(), ErrorKind::Conflict);
        assert_eq!(LedgerError::AlreadyClaimed(1).kind(), ErrorKind::Conflict);
        assert_eq!(LedgerError::Internal("x".into()).kind(), ErrorKind::Internal);
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(LedgerError::MarketNotFound(3).status_code(), StatusCode::NOT_FOUND);
        assert_eq!(LedgerError::AlreadyClaimed(3).status_code(), StatusCode::CONFLICT);
        assert_eq!(
            LedgerError::Storage(StorageError::Unavailable("down".into())).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
