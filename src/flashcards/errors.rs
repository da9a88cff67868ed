//! Card store error types

use thiserror::Error;

use crate::kv::KvError;

/// Errors surfaced by the card store, scheduler, and review flow
#[derive(Debug, Error)]
pub enum CardError {
    /// Bad input shape: content length, tag count
    #[error("Validation error: {0}")]
    Validation(String),

    /// Missing card, a card deleted concurrently, or a card owned by someone else
    #[error("Card not found: {0}")]
    CardNotFound(String),

    #[error("Card limit of {limit} exceeded")]
    CardLimitExceeded { limit: i64 },

    #[error("Grade must be between 0 and 5, got {0}")]
    InvalidGrade(i32),

    /// Unattributable transaction failures, counter drift, store failures
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<KvError> for CardError {
    fn from(err: KvError) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<CardError> for String {
    fn from(err: CardError) -> Self {
        err.to_string()
    }
}

/// Result type alias for card operations
pub type Result<T> = std::result::Result<T, CardError>;
