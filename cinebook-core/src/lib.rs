pub mod models;
pub mod repository;
pub mod token;

use repository::StoreError;
use token::TokenError;

/// Every failure the booking and session paths can surface to a caller.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    Validation(String),
    #[error("seat {seat_id} is not available for showtime {showtime_id}")]
    SeatUnavailable { seat_id: i32, showtime_id: i32 },
    #[error("seat {seat_id} already reserved")]
    SeatAlreadyReserved { seat_id: i32 },
    #[error("{0} not found")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("session blocked")]
    SessionBlocked,
    #[error("incorrect session user")]
    SessionUserMismatch,
    #[error("mismatched session token")]
    TokenMismatch,
    #[error("expired session")]
    SessionExpired,
    #[error("token is invalid")]
    InvalidToken,
    #[error("token has expired")]
    ExpiredToken,
    #[error("invalid email or password")]
    InvalidCredentials,
    #[error("Storage failure: {0}")]
    Storage(String),
    #[error("Internal service error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Seat conflicts roll the transaction back and are safe to retry with another seat set.
    pub fn is_seat_conflict(&self) -> bool {
        matches!(
            self,
            CoreError::SeatUnavailable { .. } | CoreError::SeatAlreadyReserved { .. }
        )
    }
}

impl From<TokenError> for CoreError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Expired => CoreError::ExpiredToken,
            TokenError::Invalid => CoreError::InvalidToken,
            other => CoreError::Internal(other.to_string()),
        }
    }
}

impl From<StoreError> for CoreError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => CoreError::NotFound(what),
            StoreError::UniqueViolation(constraint) => {
                CoreError::Conflict(format!("already exists ({constraint})"))
            }
            StoreError::Backend(msg) => CoreError::Storage(msg),
        }
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
