//! Ledger store trait and storage-level errors.
//!
//! The store is the only component that persists accounts and transactions.
//! Every append is atomic: the record is either durably visible to all
//! subsequent reads or not written at all. Debit appends carry an optional
//! `DebitGuard` so the store can reject a commit whose sufficiency check was
//! computed against a stale account version.

use async_trait::async_trait;
use rust_decimal::Decimal;
use thiserror::Error;

use corebank_common::{
    Account, AccountNumber, AccountStatus, AccountType, BankError, CustomerId, PinHash, Timestamp,
    Transaction,
};

/// Storage-level failure. The teller maps these onto the caller-facing
/// taxonomy; domain validation never reaches this layer.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Referenced account does not exist.
    #[error("account not found: {0}")]
    AccountNotFound(AccountNumber),

    /// A guarded append lost to a concurrent debit on the same account.
    #[error("version conflict on account {account}: guard {expected}, current {actual}")]
    VersionConflict {
        account: AccountNumber,
        expected: u64,
        actual: u64,
    },

    /// Record violates the transaction shape invariants.
    #[error("invalid transaction: {0}")]
    InvalidTransaction(String),

    /// Backend is unreachable or failed mid-operation.
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// Backend did not answer within the configured deadline.
    #[error("storage timeout: {0}")]
    Timeout(String),
}

/// Result type for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

impl From<StoreError> for BankError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::AccountNotFound(account) => BankError::AccountNotFound(account),
            // The processor retries conflicts itself; one reaching this
            // conversion has already exhausted its budget.
            StoreError::VersionConflict { account, .. } => BankError::Conflict {
                account,
                attempts: 1,
            },
            StoreError::InvalidTransaction(reason) => BankError::MalformedTransaction(reason),
            StoreError::Unavailable(reason) => BankError::Unavailable(reason),
            StoreError::Timeout(reason) => BankError::Timeout(reason),
        }
    }
}

/// Inputs for creating an account. The store assigns the account number.
#[derive(Debug, Clone)]
pub struct NewAccount {
    /// Owning customer.
    pub customer_id: CustomerId,
    /// Product variant.
    pub account_type: AccountType,
    /// Opaque PIN credential from the credential service.
    pub pin_hash: PinHash,
    /// Creation timestamp from the injected clock.
    pub created_at: Timestamp,
}

/// Optimistic concurrency guard for debit appends. Carries the account
/// version observed when the sufficiency check was computed; the store
/// commits only if the version is still current, and increments it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebitGuard {
    /// Account being debited.
    pub account: AccountNumber,
    /// Version observed at read time.
    pub version: u64,
}

impl DebitGuard {
    /// Build a guard from the account snapshot the check was run against.
    pub fn for_account(account: &Account) -> Self {
        Self {
            account: account.account_number,
            version: account.version,
        }
    }
}

/// Durable, atomic persistence for accounts and the append-only
/// transaction log.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Fetch an account by number.
    async fn get_account(&self, account: AccountNumber) -> StoreResult<Option<Account>>;

    /// Create an account with a fresh, never-reused account number.
    async fn create_account(&self, new_account: NewAccount) -> StoreResult<Account>;

    /// Change an account's status. Operator path; not reachable from the
    /// command surface.
    async fn set_account_status(
        &self,
        account: AccountNumber,
        status: AccountStatus,
    ) -> StoreResult<Account>;

    /// Current running balance for an account, maintained atomically with
    /// each append.
    async fn balance(&self, account: AccountNumber) -> StoreResult<Decimal>;

    /// Sum of all credits to the account, by full scan of the log. Audit
    /// path; `balance` is the operational read.
    async fn sum_credits(&self, account: AccountNumber) -> StoreResult<Decimal>;

    /// Sum of all debits from the account, by full scan of the log.
    async fn sum_debits(&self, account: AccountNumber) -> StoreResult<Decimal>;

    /// Every committed transaction referencing the account on either side,
    /// ordered by commit time.
    async fn list_transactions(&self, account: AccountNumber) -> StoreResult<Vec<Transaction>>;

    /// Atomically append a transaction and update running balances. With a
    /// guard, the commit succeeds only if the guarded account's version is
    /// unchanged; the version is then incremented. A transfer commits both
    /// balance effects in the same atomic unit or not at all.
    async fn append_transaction(
        &self,
        transaction: Transaction,
        guard: Option<DebitGuard>,
    ) -> StoreResult<Transaction>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use corebank_common::ErrorKind;

    #[test]
    fn test_store_error_maps_to_bank_error() {
        let account = AccountNumber::new(10_000_001);
        assert_eq!(
            BankError::from(StoreError::AccountNotFound(account)).kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            BankError::from(StoreError::Timeout("acquire".into())).kind(),
            ErrorKind::Unavailable
        );
        assert_eq!(
            BankError::from(StoreError::VersionConflict {
                account,
                expected: 1,
                actual: 2,
            })
            .kind(),
            ErrorKind::Conflict
        );
    }

    #[test]
    fn test_guard_snapshots_account_version() {
        let mut account = Account::new(
            AccountNumber::new(10_000_001),
            CustomerId::new(),
            AccountType::Checking,
            PinHash::new("salt$digest"),
            chrono::Utc::now(),
        );
        account.version = 7;
        let guard = DebitGuard::for_account(&account);
        assert_eq!(guard.account, account.account_number);
        assert_eq!(guard.version, 7);
    }
}
