//! Transaction processing: deposit, withdraw, transfer, balance inquiry.
//!
//! Each operation validates against a snapshot of the account, then asks
//! the store for an atomic append. Debits carry the snapshot's version as
//! a guard; a concurrent debit on the same account invalidates the guard
//! and the whole check-then-append sequence is re-run, up to the
//! configured retry budget. Validation failures abort before any write.

use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{info, instrument, warn};

use corebank_common::{
    Account, AccountNumber, BankError, Clock, Result, Transaction,
};
use corebank_ledger::{DebitGuard, LedgerStore, StoreError};

use crate::config::TellerConfig;
use crate::metrics::SharedTellerMetrics;

/// Validates and commits ledger operations. The only component that writes
/// to the transaction log.
pub struct TransactionProcessor {
    store: Arc<dyn LedgerStore>,
    clock: Arc<dyn Clock>,
    config: TellerConfig,
    metrics: SharedTellerMetrics,
}

impl TransactionProcessor {
    /// Create a new processor.
    pub fn new(
        store: Arc<dyn LedgerStore>,
        clock: Arc<dyn Clock>,
        config: TellerConfig,
        metrics: SharedTellerMetrics,
    ) -> Self {
        Self {
            store,
            clock,
            config,
            metrics,
        }
    }

    /// Credit an account from outside the ledger.
    #[instrument(skip(self), fields(account = %account, amount = %amount))]
    pub async fn deposit(&self, account: AccountNumber, amount: Decimal) -> Result<()> {
        let result = self.deposit_inner(account, amount).await;
        match &result {
            Ok(()) => self.metrics.deposit_committed(),
            Err(err) => {
                warn!(account = %account, error = %err, "Deposit rejected");
                self.metrics.deposit_rejected();
            }
        }
        result
    }

    async fn deposit_inner(&self, account: AccountNumber, amount: Decimal) -> Result<()> {
        if amount <= Decimal::ZERO {
            return Err(BankError::InvalidAmount(amount));
        }
        self.require_account(account).await?;

        // Credits cannot overdraw anyone; no guard needed.
        self.store
            .append_transaction(Transaction::deposit(account, amount, self.clock.now()), None)
            .await?;

        info!(account = %account, amount = %amount, "Deposit committed");
        Ok(())
    }

    /// Debit an account out of the ledger. Returns the new balance.
    ///
    /// Account status is deliberately not checked here: a disabled account
    /// can still be withdrawn from, while it cannot originate a transfer.
    #[instrument(skip(self), fields(account = %account, amount = %amount))]
    pub async fn withdraw(&self, account: AccountNumber, amount: Decimal) -> Result<Decimal> {
        let result = self.withdraw_inner(account, amount).await;
        match &result {
            Ok(new_balance) => {
                info!(account = %account, new_balance = %new_balance, "Withdrawal committed");
                self.metrics.withdrawal_committed();
            }
            Err(err) => {
                warn!(account = %account, error = %err, "Withdrawal rejected");
                self.metrics.withdrawal_rejected();
            }
        }
        result
    }

    async fn withdraw_inner(&self, account: AccountNumber, amount: Decimal) -> Result<Decimal> {
        let mut attempts = 0;
        loop {
            attempts += 1;
            let snapshot = self.require_account(account).await?;
            if amount <= Decimal::ZERO {
                return Err(BankError::InvalidAmount(amount));
            }

            let balance = self.store.balance(account).await.map_err(BankError::from)?;
            if balance - amount < Decimal::ZERO {
                return Err(BankError::InsufficientBalance {
                    requested: amount,
                    available: balance,
                });
            }

            let append = self
                .store
                .append_transaction(
                    Transaction::withdraw(account, amount, self.clock.now()),
                    Some(DebitGuard::for_account(&snapshot)),
                )
                .await;

            match append {
                // Report the committed state; concurrent deposits may have
                // landed since the pre-append read.
                Ok(_) => return self.store.balance(account).await.map_err(BankError::from),
                Err(StoreError::VersionConflict { .. }) => {
                    self.on_conflict(account, attempts)?;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// Move value between two accounts as one atomic record. Returns the
    /// sender's new balance.
    #[instrument(skip(self), fields(sender = %sender, receiver = %receiver, amount = %amount))]
    pub async fn transfer(
        &self,
        sender: AccountNumber,
        receiver: AccountNumber,
        amount: Decimal,
    ) -> Result<Decimal> {
        let result = self.transfer_inner(sender, receiver, amount).await;
        match &result {
            Ok(new_balance) => {
                info!(
                    sender = %sender,
                    receiver = %receiver,
                    sender_balance = %new_balance,
                    "Transfer committed"
                );
                self.metrics.transfer_committed();
            }
            Err(err) => {
                warn!(sender = %sender, receiver = %receiver, error = %err, "Transfer rejected");
                self.metrics.transfer_rejected();
            }
        }
        result
    }

    async fn transfer_inner(
        &self,
        sender: AccountNumber,
        receiver: AccountNumber,
        amount: Decimal,
    ) -> Result<Decimal> {
        let mut attempts = 0;
        loop {
            attempts += 1;

            // Sender-first existence, then sender status. Receiver status is
            // deliberately not checked; a disabled account can receive.
            let sender_snapshot = self
                .store
                .get_account(sender)
                .await
                .map_err(BankError::from)?
                .ok_or(BankError::SenderNotFound(sender))?;
            self.store
                .get_account(receiver)
                .await
                .map_err(BankError::from)?
                .ok_or(BankError::ReceiverNotFound(receiver))?;

            if !sender_snapshot.is_active() {
                return Err(BankError::AccountInactive(sender));
            }
            if amount <= Decimal::ZERO {
                return Err(BankError::InvalidAmount(amount));
            }

            let balance = self.store.balance(sender).await.map_err(BankError::from)?;
            if balance - amount < Decimal::ZERO {
                return Err(BankError::InsufficientBalance {
                    requested: amount,
                    available: balance,
                });
            }

            let append = self
                .store
                .append_transaction(
                    Transaction::transfer(sender, receiver, amount, self.clock.now()),
                    Some(DebitGuard::for_account(&sender_snapshot)),
                )
                .await;

            match append {
                // Re-read after commit: concurrent deposits may have landed,
                // and a self-transfer leaves the balance unchanged.
                Ok(_) => return self.store.balance(sender).await.map_err(BankError::from),
                Err(StoreError::VersionConflict { .. }) => {
                    self.on_conflict(sender, attempts)?;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// Current balance of an account.
    pub async fn balance_inquiry(&self, account: AccountNumber) -> Result<Decimal> {
        self.require_account(account).await?;
        self.store.balance(account).await.map_err(BankError::from)
    }

    async fn require_account(&self, account: AccountNumber) -> Result<Account> {
        self.store
            .get_account(account)
            .await
            .map_err(BankError::from)?
            .ok_or(BankError::AccountNotFound(account))
    }

    /// Account for one lost optimistic commit; errors out once the retry
    /// budget is spent.
    fn on_conflict(&self, account: AccountNumber, attempts: u32) -> Result<()> {
        if attempts > self.config.max_commit_retries {
            return Err(BankError::Conflict { account, attempts });
        }
        warn!(account = %account, attempts, "Commit conflict, retrying");
        self.metrics.conflict_retry();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::TellerMetrics;
    use corebank_common::{
        AccountStatus, AccountType, CustomerId, ErrorKind, PinHash, SystemClock,
    };
    use corebank_ledger::{reconcile, MemoryLedgerStore, NewAccount};
    use futures::future::join_all;
    use rust_decimal_macros::dec;

    struct Fixture {
        store: Arc<MemoryLedgerStore>,
        processor: TransactionProcessor,
        metrics: SharedTellerMetrics,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryLedgerStore::new());
        let metrics: SharedTellerMetrics = Arc::new(TellerMetrics::new());
        let processor = TransactionProcessor::new(
            store.clone(),
            Arc::new(SystemClock),
            TellerConfig::default(),
            metrics.clone(),
        );
        Fixture {
            store,
            processor,
            metrics,
        }
    }

    async fn open(fixture: &Fixture) -> AccountNumber {
        fixture
            .store
            .create_account(NewAccount {
                customer_id: CustomerId::new(),
                account_type: AccountType::Checking,
                pin_hash: PinHash::new("salt$digest"),
                created_at: chrono::Utc::now(),
            })
            .await
            .unwrap()
            .account_number
    }

    #[tokio::test]
    async fn test_deposit_then_inquiry() {
        let fx = fixture();
        let account = open(&fx).await;

        fx.processor.deposit(account, dec!(1000)).await.unwrap();
        assert_eq!(fx.processor.balance_inquiry(account).await.unwrap(), dec!(1000));
    }

    #[tokio::test]
    async fn test_deposit_rejects_non_positive_amount() {
        let fx = fixture();
        let account = open(&fx).await;

        for amount in [dec!(0), dec!(-10)] {
            let err = fx.processor.deposit(account, amount).await.unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Validation);
        }
        assert_eq!(fx.store.log_len(), 0);
        assert_eq!(fx.metrics.snapshot().deposits_rejected, 2);
    }

    #[tokio::test]
    async fn test_deposit_rejects_unknown_account() {
        let fx = fixture();
        let err = fx
            .processor
            .deposit(AccountNumber::new(99), dec!(10))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_withdraw_to_zero_then_overdraft_rejected() {
        let fx = fixture();
        let account = open(&fx).await;
        fx.processor.deposit(account, dec!(1000)).await.unwrap();

        let new_balance = fx.processor.withdraw(account, dec!(1000)).await.unwrap();
        assert_eq!(new_balance, dec!(0));
        assert_eq!(fx.processor.balance_inquiry(account).await.unwrap(), dec!(0));

        let err = fx.processor.withdraw(account, dec!(1)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InsufficientFunds);
        assert_eq!(fx.store.log_len(), 2);
    }

    #[tokio::test]
    async fn test_disabled_account_can_still_withdraw() {
        let fx = fixture();
        let account = open(&fx).await;
        fx.processor.deposit(account, dec!(100)).await.unwrap();
        fx.store
            .set_account_status(account, AccountStatus::Disabled)
            .await
            .unwrap();

        let new_balance = fx.processor.withdraw(account, dec!(40)).await.unwrap();
        assert_eq!(new_balance, dec!(60));
    }

    #[tokio::test]
    async fn test_transfer_moves_funds() {
        let fx = fixture();
        let a = open(&fx).await;
        let b = open(&fx).await;
        fx.processor.deposit(a, dec!(1000)).await.unwrap();

        let sender_balance = fx.processor.transfer(a, b, dec!(500)).await.unwrap();
        assert_eq!(sender_balance, dec!(500));
        assert_eq!(fx.processor.balance_inquiry(a).await.unwrap(), dec!(500));
        assert_eq!(fx.processor.balance_inquiry(b).await.unwrap(), dec!(500));
    }

    #[tokio::test]
    async fn test_self_transfer_commits_with_unchanged_balance() {
        let fx = fixture();
        let account = open(&fx).await;
        fx.processor.deposit(account, dec!(100)).await.unwrap();

        let new_balance = fx
            .processor
            .transfer(account, account, dec!(10))
            .await
            .unwrap();
        assert_eq!(new_balance, dec!(100));
        assert_eq!(fx.processor.balance_inquiry(account).await.unwrap(), dec!(100));
        // The record still lands in the log.
        assert_eq!(fx.store.log_len(), 2);
        assert!(reconcile(fx.store.as_ref(), account).await.unwrap().is_clean());
    }

    #[tokio::test]
    async fn test_self_transfer_still_requires_sufficient_balance() {
        let fx = fixture();
        let account = open(&fx).await;
        fx.processor.deposit(account, dec!(100)).await.unwrap();

        let err = fx
            .processor
            .transfer(account, account, dec!(500))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InsufficientFunds);
        assert_eq!(fx.store.log_len(), 1);
    }

    #[tokio::test]
    async fn test_transfer_checks_sender_first() {
        let fx = fixture();
        let a = open(&fx).await;
        let missing = AccountNumber::new(99);

        let err = fx.processor.transfer(missing, a, dec!(1)).await.unwrap_err();
        assert!(matches!(err, BankError::SenderNotFound(n) if n == missing));

        let err = fx.processor.transfer(a, missing, dec!(1)).await.unwrap_err();
        assert!(matches!(err, BankError::ReceiverNotFound(n) if n == missing));

        // Both accounts missing: the sender is reported.
        let other = AccountNumber::new(98);
        let err = fx
            .processor
            .transfer(missing, other, dec!(1))
            .await
            .unwrap_err();
        assert!(matches!(err, BankError::SenderNotFound(n) if n == missing));
    }

    #[tokio::test]
    async fn test_disabled_sender_cannot_transfer() {
        let fx = fixture();
        let a = open(&fx).await;
        let b = open(&fx).await;
        fx.processor.deposit(b, dec!(100)).await.unwrap();
        fx.store
            .set_account_status(b, AccountStatus::Disabled)
            .await
            .unwrap();

        let err = fx.processor.transfer(b, a, dec!(1)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AccountInactive);
        // No record was written and the balance is untouched.
        assert_eq!(fx.store.log_len(), 1);
        assert_eq!(fx.processor.balance_inquiry(b).await.unwrap(), dec!(100));
    }

    #[tokio::test]
    async fn test_disabled_receiver_can_receive() {
        let fx = fixture();
        let a = open(&fx).await;
        let b = open(&fx).await;
        fx.processor.deposit(a, dec!(100)).await.unwrap();
        fx.store
            .set_account_status(b, AccountStatus::Disabled)
            .await
            .unwrap();

        fx.processor.transfer(a, b, dec!(30)).await.unwrap();
        assert_eq!(fx.processor.balance_inquiry(b).await.unwrap(), dec!(30));
    }

    #[tokio::test]
    async fn test_failed_transfer_leaves_both_sides_untouched() {
        let fx = fixture();
        let a = open(&fx).await;
        let b = open(&fx).await;
        fx.processor.deposit(a, dec!(100)).await.unwrap();

        let err = fx.processor.transfer(a, b, dec!(500)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InsufficientFunds);
        assert_eq!(fx.processor.balance_inquiry(a).await.unwrap(), dec!(100));
        assert_eq!(fx.processor.balance_inquiry(b).await.unwrap(), dec!(0));
        assert_eq!(fx.store.log_len(), 1);
    }

    #[tokio::test]
    async fn test_repeated_inquiries_are_idempotent() {
        let fx = fixture();
        let account = open(&fx).await;
        fx.processor.deposit(account, dec!(77)).await.unwrap();

        let first = fx.processor.balance_inquiry(account).await.unwrap();
        let second = fx.processor.balance_inquiry(account).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_withdrawals_allow_exactly_one_winner() {
        let fx = fixture();
        let account = open(&fx).await;
        fx.processor.deposit(account, dec!(100)).await.unwrap();

        let processor = Arc::new(fx.processor);
        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let processor = processor.clone();
                tokio::spawn(async move { processor.withdraw(account, dec!(100)).await })
            })
            .collect();

        let outcomes: Vec<_> = join_all(tasks)
            .await
            .into_iter()
            .map(|joined| joined.unwrap())
            .collect();

        let successes = outcomes.iter().filter(|r| r.is_ok()).count();
        let insufficient = outcomes
            .iter()
            .filter(|r| {
                matches!(r, Err(err) if err.kind() == ErrorKind::InsufficientFunds)
            })
            .count();

        assert_eq!(successes, 1);
        assert_eq!(successes + insufficient, outcomes.len());
        assert_eq!(fx.store.balance(account).await.unwrap(), dec!(0));
        assert!(reconcile(fx.store.as_ref(), account).await.unwrap().is_clean());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_contended_transfers_never_overdraw() {
        let fx = fixture();
        let a = open(&fx).await;
        let b = open(&fx).await;
        fx.processor.deposit(a, dec!(50)).await.unwrap();

        let processor = Arc::new(fx.processor);
        let tasks: Vec<_> = (0..10)
            .map(|_| {
                let processor = processor.clone();
                tokio::spawn(async move { processor.transfer(a, b, dec!(10)).await })
            })
            .collect();

        let outcomes: Vec<_> = join_all(tasks)
            .await
            .into_iter()
            .map(|joined| joined.unwrap())
            .collect();

        // Retry budgets may turn some losses into Conflict errors, so assert
        // conservation rather than an exact success count.
        let successes = outcomes.iter().filter(|r| r.is_ok()).count() as u64;
        assert!(successes >= 1 && successes <= 5);

        let balance_a = fx.store.balance(a).await.unwrap();
        let balance_b = fx.store.balance(b).await.unwrap();
        assert!(balance_a >= dec!(0));
        assert_eq!(balance_b, Decimal::from(successes * 10));
        assert_eq!(balance_a + balance_b, dec!(50));
        for account in [a, b] {
            assert!(reconcile(fx.store.as_ref(), account).await.unwrap().is_clean());
        }
    }
}
