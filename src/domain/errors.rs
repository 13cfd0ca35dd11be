use thiserror::Error;

use crate::domain::repositories::ledger_store::StoreError;

/// Caller-visible failure taxonomy for ledger operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("login is empty")]
    LoginEmpty,

    #[error("password is empty")]
    PasswordEmpty,

    #[error("login '{0}' is busy")]
    LoginBusy(String),

    /// Bad credentials, forged token, unknown user. Deliberately carries no detail.
    #[error("unauthorized")]
    Unauthorized,

    #[error("incorrect order number format: {0}")]
    IncorrectFormat(String),

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("order {0} was already posted by another user")]
    ConflictOtherOwner(String),

    #[error("insufficient funds: requested {requested}, available {available}")]
    InsufficientFunds { requested: i64, available: i64 },

    /// Opaque failure; the detail is logged where it happens, not returned.
    #[error("internal error")]
    Internal,
}

/// Coarse classification of [`LedgerError`] used by the boundary layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Conflict,
    Auth,
    InsufficientFunds,
    Internal,
}

impl LedgerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LedgerError::LoginEmpty
            | LedgerError::PasswordEmpty
            | LedgerError::IncorrectFormat(_)
            | LedgerError::InvalidAmount(_) => ErrorKind::Validation,
            LedgerError::LoginBusy(_) | LedgerError::ConflictOtherOwner(_) => ErrorKind::Conflict,
            LedgerError::Unauthorized => ErrorKind::Auth,
            LedgerError::InsufficientFunds { .. } => ErrorKind::InsufficientFunds,
            LedgerError::Internal => ErrorKind::Internal,
        }
    }

    /// Whether the caller could succeed by retrying the same request unchanged
    pub fn is_retryable(&self) -> bool {
        matches!(self, LedgerError::Internal)
    }
}

impl From<StoreError> for LedgerError {
    fn from(error: StoreError) -> Self {
        tracing::error!("Store failure: {}", error);
        LedgerError::Internal
    }
}
