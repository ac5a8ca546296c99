//! Derived balance and reconciliation.
//!
//! The balance is a pure function of the transaction log:
//! `SumCredits(account) - SumDebits(account)`. The stores also maintain a
//! running balance updated with each append; this module is the audit path
//! that recomputes the derived value and reports any drift.

use rust_decimal::Decimal;
use serde::Serialize;

use corebank_common::AccountNumber;

use crate::store::{LedgerStore, StoreResult};

/// Recompute an account's balance from the full transaction log.
pub async fn derived_balance(
    store: &dyn LedgerStore,
    account: AccountNumber,
) -> StoreResult<Decimal> {
    let credits = store.sum_credits(account).await?;
    let debits = store.sum_debits(account).await?;
    Ok(credits - debits)
}

/// Outcome of comparing an account's running balance against the derived
/// full-scan value.
#[derive(Debug, Clone, Serialize)]
pub struct ReconcileReport {
    /// Account examined.
    pub account: AccountNumber,
    /// Running balance maintained by the store.
    pub running: Decimal,
    /// Balance recomputed from the log.
    pub derived: Decimal,
    /// `running - derived`; zero when the store is consistent.
    pub drift: Decimal,
}

impl ReconcileReport {
    /// True when the running balance matches the log exactly.
    pub fn is_clean(&self) -> bool {
        self.drift.is_zero()
    }
}

/// Recompute the derived balance for an account and compare it against the
/// store's running value.
pub async fn reconcile(
    store: &dyn LedgerStore,
    account: AccountNumber,
) -> StoreResult<ReconcileReport> {
    let running = store.balance(account).await?;
    let derived = derived_balance(store, account).await?;
    Ok(ReconcileReport {
        account,
        running,
        derived,
        drift: running - derived,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryLedgerStore;
    use crate::store::NewAccount;
    use corebank_common::{AccountType, CustomerId, PinHash, Transaction};
    use rust_decimal_macros::dec;

    async fn open(store: &MemoryLedgerStore) -> AccountNumber {
        store
            .create_account(NewAccount {
                customer_id: CustomerId::new(),
                account_type: AccountType::Savings,
                pin_hash: PinHash::new("salt$digest"),
                created_at: chrono::Utc::now(),
            })
            .await
            .unwrap()
            .account_number
    }

    #[tokio::test]
    async fn test_derived_balance_matches_signed_sum() {
        let store = MemoryLedgerStore::new();
        let a = open(&store).await;
        let b = open(&store).await;

        for txn in [
            Transaction::deposit(a, dec!(1000), chrono::Utc::now()),
            Transaction::withdraw(a, dec!(250), chrono::Utc::now()),
            Transaction::transfer(a, b, dec!(100), chrono::Utc::now()),
        ] {
            store.append_transaction(txn, None).await.unwrap();
        }

        assert_eq!(derived_balance(&store, a).await.unwrap(), dec!(650));
        assert_eq!(derived_balance(&store, b).await.unwrap(), dec!(100));
    }

    #[tokio::test]
    async fn test_reconcile_is_clean_after_appends() {
        let store = MemoryLedgerStore::new();
        let a = open(&store).await;
        store
            .append_transaction(Transaction::deposit(a, dec!(42), chrono::Utc::now()), None)
            .await
            .unwrap();

        let report = reconcile(&store, a).await.unwrap();
        assert!(report.is_clean());
        assert_eq!(report.running, dec!(42));
        assert_eq!(report.derived, dec!(42));
    }

    #[tokio::test]
    async fn test_reconcile_unknown_account_fails() {
        let store = MemoryLedgerStore::new();
        let result = reconcile(&store, AccountNumber::new(99)).await;
        assert!(result.is_err());
    }
}
