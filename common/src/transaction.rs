//! Transaction log records.
//!
//! Every movement of value is one immutable record. Deposits carry only a
//! receiver, withdrawals only a sender, and a transfer is a single record
//! naming both sides; there is never a separate debit/credit pair.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::identifiers::{AccountNumber, TransactionId};

/// Kind of ledger transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionKind {
    /// Credit from outside the ledger into an account.
    Deposit,
    /// Debit from an account out of the ledger.
    Withdraw,
    /// Movement between two accounts, committed as one record.
    Transfer,
}

impl TransactionKind {
    /// Stable string form used in persisted rows.
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Deposit => "Deposit",
            TransactionKind::Withdraw => "Withdraw",
            TransactionKind::Transfer => "Transfer",
        }
    }

    /// Parse the persisted string form.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Deposit" => Some(TransactionKind::Deposit),
            "Withdraw" => Some(TransactionKind::Withdraw),
            "Transfer" => Some(TransactionKind::Transfer),
            _ => None,
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single transaction in the append-only log. Created exactly once and
/// immutable thereafter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    /// Unique transaction ID.
    pub id: TransactionId,
    /// Kind of movement.
    pub kind: TransactionKind,
    /// Debited account; absent for deposits.
    pub sender: Option<AccountNumber>,
    /// Credited account; absent for withdrawals.
    pub receiver: Option<AccountNumber>,
    /// Amount moved; strictly positive.
    pub amount: Decimal,
    /// When the transaction was committed.
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    /// Create a deposit record crediting `receiver`.
    pub fn deposit(receiver: AccountNumber, amount: Decimal, created_at: DateTime<Utc>) -> Self {
        Self {
            id: TransactionId::new(),
            kind: TransactionKind::Deposit,
            sender: None,
            receiver: Some(receiver),
            amount,
            created_at,
        }
    }

    /// Create a withdrawal record debiting `sender`.
    pub fn withdraw(sender: AccountNumber, amount: Decimal, created_at: DateTime<Utc>) -> Self {
        Self {
            id: TransactionId::new(),
            kind: TransactionKind::Withdraw,
            sender: Some(sender),
            receiver: None,
            amount,
            created_at,
        }
    }

    /// Create a transfer record moving `amount` from `sender` to `receiver`.
    pub fn transfer(
        sender: AccountNumber,
        receiver: AccountNumber,
        amount: Decimal,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: TransactionId::new(),
            kind: TransactionKind::Transfer,
            sender: Some(sender),
            receiver: Some(receiver),
            amount,
            created_at,
        }
    }

    /// Check whether this record credits the given account.
    pub fn credits(&self, account: AccountNumber) -> bool {
        self.receiver == Some(account)
    }

    /// Check whether this record debits the given account.
    pub fn debits(&self, account: AccountNumber) -> bool {
        self.sender == Some(account)
    }

    /// Check whether this record references the given account on either side.
    pub fn touches(&self, account: AccountNumber) -> bool {
        self.credits(account) || self.debits(account)
    }

    /// Get the signed contribution of this record to the account's balance
    /// (positive when credited, negative when debited, zero when unrelated).
    pub fn signed_amount_for(&self, account: AccountNumber) -> Decimal {
        let mut signed = Decimal::ZERO;
        if self.credits(account) {
            signed += self.amount;
        }
        if self.debits(account) {
            signed -= self.amount;
        }
        signed
    }

    /// Verify the record satisfies the log shape invariants: a strictly
    /// positive amount, and sender/receiver sides matching the kind.
    pub fn is_well_formed(&self) -> bool {
        if self.amount <= Decimal::ZERO {
            return false;
        }
        match self.kind {
            TransactionKind::Deposit => self.sender.is_none() && self.receiver.is_some(),
            TransactionKind::Withdraw => self.sender.is_some() && self.receiver.is_none(),
            TransactionKind::Transfer => self.sender.is_some() && self.receiver.is_some(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    const A: AccountNumber = AccountNumber::new(10_000_001);
    const B: AccountNumber = AccountNumber::new(10_000_002);

    #[test]
    fn test_deposit_shape() {
        let txn = Transaction::deposit(A, dec!(100), Utc::now());
        assert!(txn.is_well_formed());
        assert!(txn.credits(A));
        assert!(!txn.debits(A));
        assert_eq!(txn.signed_amount_for(A), dec!(100));
        assert_eq!(txn.signed_amount_for(B), dec!(0));
    }

    #[test]
    fn test_withdraw_shape() {
        let txn = Transaction::withdraw(A, dec!(40), Utc::now());
        assert!(txn.is_well_formed());
        assert!(txn.debits(A));
        assert_eq!(txn.signed_amount_for(A), dec!(-40));
    }

    #[test]
    fn test_transfer_touches_both_sides() {
        let txn = Transaction::transfer(A, B, dec!(25), Utc::now());
        assert!(txn.is_well_formed());
        assert_eq!(txn.signed_amount_for(A), dec!(-25));
        assert_eq!(txn.signed_amount_for(B), dec!(25));
        assert!(txn.touches(A));
        assert!(txn.touches(B));
    }

    #[test]
    fn test_non_positive_amount_is_malformed() {
        assert!(!Transaction::deposit(A, dec!(0), Utc::now()).is_well_formed());
        assert!(!Transaction::withdraw(A, dec!(-1), Utc::now()).is_well_formed());
    }

    #[test]
    fn test_self_transfer_is_well_formed_and_nets_zero() {
        let txn = Transaction::transfer(A, A, dec!(10), Utc::now());
        assert!(txn.is_well_formed());
        assert_eq!(txn.signed_amount_for(A), dec!(0));
    }

    #[test]
    fn test_serde_round_trip() {
        let txn = Transaction::transfer(A, B, dec!(12.50), Utc::now());
        let json = serde_json::to_string(&txn).unwrap();
        let back: Transaction = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, txn.id);
        assert_eq!(back.kind, TransactionKind::Transfer);
        assert_eq!(back.amount, dec!(12.50));
    }
}
