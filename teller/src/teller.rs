//! The teller facade: the full command surface in one place.

use std::sync::Arc;

use rust_decimal::Decimal;

use corebank_common::{AccountNumber, AccountType, BankError, Clock, CustomerId, Result, Transaction};
use corebank_ledger::{reconcile, LedgerStore, ReconcileReport};

use crate::accounts::{AccountManager, OpenAccountReceipt};
use crate::config::TellerConfig;
use crate::credential::CredentialService;
use crate::directory::CustomerDirectory;
use crate::metrics::{SharedTellerMetrics, TellerMetrics, TellerMetricsSnapshot};
use crate::pin::{Pin, PinGenerator};
use crate::processor::TransactionProcessor;

/// Bundles the account manager and transaction processor behind the
/// command surface an external router consumes.
pub struct Teller {
    store: Arc<dyn LedgerStore>,
    credentials: Arc<dyn CredentialService>,
    accounts: AccountManager,
    processor: TransactionProcessor,
    metrics: SharedTellerMetrics,
}

impl Teller {
    /// Assemble a teller from its collaborators.
    pub fn new(
        store: Arc<dyn LedgerStore>,
        directory: Arc<dyn CustomerDirectory>,
        credentials: Arc<dyn CredentialService>,
        pin_generator: Arc<dyn PinGenerator>,
        clock: Arc<dyn Clock>,
        config: TellerConfig,
    ) -> Self {
        let metrics: SharedTellerMetrics = Arc::new(TellerMetrics::new());
        let accounts = AccountManager::new(
            store.clone(),
            directory,
            credentials.clone(),
            pin_generator,
            clock.clone(),
        );
        let processor = TransactionProcessor::new(store.clone(), clock, config, metrics.clone());
        Self {
            store,
            credentials,
            accounts,
            processor,
            metrics,
        }
    }

    /// Open an account for a customer. The receipt carries the plaintext
    /// PIN, shown once.
    pub async fn open_account(
        &self,
        customer_id: CustomerId,
        account_type: AccountType,
    ) -> Result<OpenAccountReceipt> {
        let receipt = self.accounts.open_account(customer_id, account_type).await?;
        self.metrics.account_opened();
        Ok(receipt)
    }

    /// Deposit into an account.
    pub async fn deposit(&self, account: AccountNumber, amount: Decimal) -> Result<()> {
        self.processor.deposit(account, amount).await
    }

    /// Withdraw from an account. Returns the new balance.
    pub async fn withdraw(&self, account: AccountNumber, amount: Decimal) -> Result<Decimal> {
        self.processor.withdraw(account, amount).await
    }

    /// Transfer between accounts. Returns the sender's new balance.
    pub async fn transfer(
        &self,
        sender: AccountNumber,
        receiver: AccountNumber,
        amount: Decimal,
    ) -> Result<Decimal> {
        self.processor.transfer(sender, receiver, amount).await
    }

    /// Current balance of an account.
    pub async fn balance_inquiry(&self, account: AccountNumber) -> Result<Decimal> {
        self.processor.balance_inquiry(account).await
    }

    /// Every committed transaction touching the account, ordered by commit
    /// time.
    pub async fn transaction_history(&self, account: AccountNumber) -> Result<Vec<Transaction>> {
        self.accounts.require_account(account).await?;
        self.store
            .list_transactions(account)
            .await
            .map_err(BankError::from)
    }

    /// Check a PIN against the account's stored credential. Exists for the
    /// external auth layer; the ledger operations never call it.
    pub async fn verify_pin(&self, account: AccountNumber, pin: &Pin) -> Result<bool> {
        let record = self.accounts.require_account(account).await?;
        Ok(self.credentials.verify(pin.expose(), &record.pin_hash))
    }

    /// Recompute the derived balance for an account and compare it against
    /// the running value. Audit path.
    pub async fn reconcile_account(&self, account: AccountNumber) -> Result<ReconcileReport> {
        reconcile(self.store.as_ref(), account)
            .await
            .map_err(BankError::from)
    }

    /// Snapshot of the operation counters.
    pub fn metrics(&self) -> TellerMetricsSnapshot {
        self.metrics.snapshot()
    }
}
