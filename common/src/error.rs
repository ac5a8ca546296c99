//! Error types for CoreBank operations.

use rust_decimal::Decimal;
use thiserror::Error;

use crate::identifiers::{AccountNumber, CustomerId};

/// Coarse error classification for callers that route on category rather than
/// on the specific failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Referenced customer or account does not exist.
    NotFound,
    /// Input failed validation before any write.
    Validation,
    /// The operation would drive a balance below zero.
    InsufficientFunds,
    /// Account status forbids the operation.
    AccountInactive,
    /// Concurrent commits exhausted the retry budget.
    Conflict,
    /// Storage or transport failure outside the domain.
    Unavailable,
}

/// Main error type for ledger operations.
#[derive(Error, Debug)]
pub enum BankError {
    /// Customer absent from the directory.
    #[error("Customer not found: {0}")]
    CustomerNotFound(CustomerId),

    /// Account absent from the ledger.
    #[error("Account not found: {0}")]
    AccountNotFound(AccountNumber),

    /// Transfer sender absent from the ledger.
    #[error("Sender account not found: {0}")]
    SenderNotFound(AccountNumber),

    /// Transfer receiver absent from the ledger.
    #[error("Receiver account not found: {0}")]
    ReceiverNotFound(AccountNumber),

    /// Amount must be strictly positive.
    #[error("Invalid amount: {0}")]
    InvalidAmount(Decimal),

    /// Record violates the transaction shape invariants.
    #[error("Malformed transaction: {0}")]
    MalformedTransaction(String),

    /// Balance would go negative.
    #[error("Insufficient balance: requested {requested}, available {available}")]
    InsufficientBalance {
        requested: Decimal,
        available: Decimal,
    },

    /// Account is not Active.
    #[error("Account inactive: {0}")]
    AccountInactive(AccountNumber),

    /// Optimistic commit kept losing to concurrent debits.
    #[error("Commit conflict on account {account} after {attempts} attempts")]
    Conflict { account: AccountNumber, attempts: u32 },

    /// Storage backend failure.
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    /// Storage operation timed out.
    #[error("Operation timed out: {0}")]
    Timeout(String),
}

impl BankError {
    /// Classify this error into the caller-facing taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            BankError::CustomerNotFound(_)
            | BankError::AccountNotFound(_)
            | BankError::SenderNotFound(_)
            | BankError::ReceiverNotFound(_) => ErrorKind::NotFound,
            BankError::InvalidAmount(_) | BankError::MalformedTransaction(_) => {
                ErrorKind::Validation
            }
            BankError::InsufficientBalance { .. } => ErrorKind::InsufficientFunds,
            BankError::AccountInactive(_) => ErrorKind::AccountInactive,
            BankError::Conflict { .. } => ErrorKind::Conflict,
            BankError::Unavailable(_) | BankError::Timeout(_) => ErrorKind::Unavailable,
        }
    }

    /// Check if retrying the whole operation may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            BankError::Conflict { .. } | BankError::Unavailable(_) | BankError::Timeout(_)
        )
    }

    /// Get a stable error code for external surfaces.
    pub fn code(&self) -> &'static str {
        match self {
            BankError::CustomerNotFound(_) => "CUSTOMER_NOT_FOUND",
            BankError::AccountNotFound(_) => "ACCOUNT_NOT_FOUND",
            BankError::SenderNotFound(_) => "SENDER_NOT_FOUND",
            BankError::ReceiverNotFound(_) => "RECEIVER_NOT_FOUND",
            BankError::InvalidAmount(_) => "INVALID_AMOUNT",
            BankError::MalformedTransaction(_) => "MALFORMED_TRANSACTION",
            BankError::InsufficientBalance { .. } => "INSUFFICIENT_BALANCE",
            BankError::AccountInactive(_) => "ACCOUNT_INACTIVE",
            BankError::Conflict { .. } => "COMMIT_CONFLICT",
            BankError::Unavailable(_) => "STORAGE_UNAVAILABLE",
            BankError::Timeout(_) => "TIMEOUT",
        }
    }
}

/// Result type alias for ledger operations.
pub type Result<T> = std::result::Result<T, BankError>;

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_kind_classification() {
        let account = AccountNumber::new(10_000_001);
        assert_eq!(
            BankError::AccountNotFound(account).kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            BankError::InvalidAmount(dec!(-5)).kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            BankError::InsufficientBalance {
                requested: dec!(100),
                available: dec!(40),
            }
            .kind(),
            ErrorKind::InsufficientFunds
        );
        assert_eq!(
            BankError::Timeout("acquire".into()).kind(),
            ErrorKind::Unavailable
        );
    }

    #[test]
    fn test_retryable() {
        let account = AccountNumber::new(10_000_001);
        assert!(BankError::Conflict {
            account,
            attempts: 3
        }
        .is_retryable());
        assert!(BankError::Unavailable("pool exhausted".into()).is_retryable());
        assert!(!BankError::AccountNotFound(account).is_retryable());
    }

    #[test]
    fn test_codes_are_stable() {
        let account = AccountNumber::new(10_000_001);
        assert_eq!(
            BankError::AccountInactive(account).code(),
            "ACCOUNT_INACTIVE"
        );
        assert_eq!(
            BankError::InsufficientBalance {
                requested: dec!(1),
                available: dec!(0),
            }
            .code(),
            "INSUFFICIENT_BALANCE"
        );
    }
}
