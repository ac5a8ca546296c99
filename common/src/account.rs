//! Account record and status definitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::identifiers::{AccountNumber, CustomerId};

/// Account status. Only Active accounts may originate transfers; the rule is
/// enforced by the transaction processor, not by the record itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccountStatus {
    /// Account is open and fully operational.
    Active,
    /// Account is disabled and may not originate transfers.
    Disabled,
}

impl AccountStatus {
    /// Stable string form used in persisted rows.
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountStatus::Active => "Active",
            AccountStatus::Disabled => "Disabled",
        }
    }

    /// Parse the persisted string form.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Active" => Some(AccountStatus::Active),
            "Disabled" => Some(AccountStatus::Disabled),
            _ => None,
        }
    }
}

impl fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Product variant of an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccountType {
    /// Interest-bearing savings account.
    Savings,
    /// Transactional checking account.
    Checking,
}

impl AccountType {
    /// Stable string form used in persisted rows.
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountType::Savings => "Savings",
            AccountType::Checking => "Checking",
        }
    }

    /// Parse the persisted string form.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Savings" => Some(AccountType::Savings),
            "Checking" => Some(AccountType::Checking),
            _ => None,
        }
    }
}

impl fmt::Display for AccountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque credential digest produced by the credential service. Never holds
/// plaintext PIN material.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinHash(String);

impl PinHash {
    /// Wrap an already-hashed credential.
    pub fn new(hash: impl Into<String>) -> Self {
        Self(hash.into())
    }

    /// Get the digest as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PinHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A customer-owned account. The balance is never stored here; it is derived
/// from the transaction log at all times.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    /// Unique account number assigned at creation.
    pub account_number: AccountNumber,
    /// Owning customer.
    pub customer_id: CustomerId,
    /// Product variant.
    pub account_type: AccountType,
    /// Opaque PIN credential.
    pub pin_hash: PinHash,
    /// Account status.
    pub status: AccountStatus,
    /// Optimistic concurrency token, incremented by the store on each
    /// committed debit against this account.
    pub version: u64,
    /// When the account was created.
    pub created_at: DateTime<Utc>,
}

impl Account {
    /// Create a new Active account record.
    pub fn new(
        account_number: AccountNumber,
        customer_id: CustomerId,
        account_type: AccountType,
        pin_hash: PinHash,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            account_number,
            customer_id,
            account_type,
            pin_hash,
            status: AccountStatus::Active,
            version: 0,
            created_at,
        }
    }

    /// Check if the account is in the Active status.
    pub fn is_active(&self) -> bool {
        self.status == AccountStatus::Active
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(status: AccountStatus) -> Account {
        let mut account = Account::new(
            AccountNumber::new(10_000_001),
            CustomerId::new(),
            AccountType::Savings,
            PinHash::new("salt$digest"),
            Utc::now(),
        );
        account.status = status;
        account
    }

    #[test]
    fn test_new_account_is_active() {
        let account = account(AccountStatus::Active);
        assert!(account.is_active());
        assert_eq!(account.version, 0);
    }

    #[test]
    fn test_disabled_account_is_not_active() {
        assert!(!account(AccountStatus::Disabled).is_active());
    }

    #[test]
    fn test_status_string_round_trip() {
        for status in [AccountStatus::Active, AccountStatus::Disabled] {
            assert_eq!(AccountStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(AccountStatus::parse("Suspended"), None);
    }

    #[test]
    fn test_account_type_string_round_trip() {
        for kind in [AccountType::Savings, AccountType::Checking] {
            assert_eq!(AccountType::parse(kind.as_str()), Some(kind));
        }
    }
}
