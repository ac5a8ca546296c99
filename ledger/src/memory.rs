//! In-process ledger store.
//!
//! Accounts, the append-only log, and the running balances live behind one
//! writer lock, so every append commits its record and both balance effects
//! as a single atomic unit. Version-token checks for guarded debits run
//! under the same lock.

use std::collections::HashMap;

use parking_lot::RwLock;
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use async_trait::async_trait;
use corebank_common::{Account, AccountNumber, AccountStatus, Transaction};

use crate::store::{DebitGuard, LedgerStore, NewAccount, StoreError, StoreResult};

/// First account number handed out. Numbers count up from here and are
/// never reused.
const ACCOUNT_NUMBER_SEED: u32 = 10_000_000;

#[derive(Default)]
struct LedgerState {
    accounts: HashMap<AccountNumber, Account>,
    log: Vec<Transaction>,
    balances: HashMap<AccountNumber, Decimal>,
    issued_numbers: u32,
}

impl LedgerState {
    fn next_account_number(&mut self) -> AccountNumber {
        self.issued_numbers += 1;
        AccountNumber::new(ACCOUNT_NUMBER_SEED + self.issued_numbers)
    }

    fn credit(&mut self, account: AccountNumber, amount: Decimal) {
        *self.balances.entry(account).or_insert(Decimal::ZERO) += amount;
    }

    fn debit(&mut self, account: AccountNumber, amount: Decimal) {
        *self.balances.entry(account).or_insert(Decimal::ZERO) -= amount;
    }
}

/// In-memory `LedgerStore` used by unit tests and the simulator.
pub struct MemoryLedgerStore {
    state: RwLock<LedgerState>,
}

impl MemoryLedgerStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            state: RwLock::new(LedgerState::default()),
        }
    }

    /// Total number of committed transactions, across all accounts.
    pub fn log_len(&self) -> usize {
        self.state.read().log.len()
    }

    /// Sum of all running balances. Deposits add to it, withdrawals remove
    /// from it, transfers leave it unchanged.
    pub fn total_funds(&self) -> Decimal {
        self.state.read().balances.values().copied().sum()
    }
}

impl Default for MemoryLedgerStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    async fn get_account(&self, account: AccountNumber) -> StoreResult<Option<Account>> {
        Ok(self.state.read().accounts.get(&account).cloned())
    }

    async fn create_account(&self, new_account: NewAccount) -> StoreResult<Account> {
        let mut state = self.state.write();
        let number = state.next_account_number();
        let account = Account::new(
            number,
            new_account.customer_id,
            new_account.account_type,
            new_account.pin_hash,
            new_account.created_at,
        );
        state.accounts.insert(number, account.clone());
        state.balances.insert(number, Decimal::ZERO);
        info!(account = %number, customer = %account.customer_id, "Account created");
        Ok(account)
    }

    async fn set_account_status(
        &self,
        account: AccountNumber,
        status: AccountStatus,
    ) -> StoreResult<Account> {
        let mut state = self.state.write();
        let record = state
            .accounts
            .get_mut(&account)
            .ok_or(StoreError::AccountNotFound(account))?;
        record.status = status;
        info!(account = %account, status = %status, "Account status changed");
        Ok(record.clone())
    }

    async fn balance(&self, account: AccountNumber) -> StoreResult<Decimal> {
        let state = self.state.read();
        if !state.accounts.contains_key(&account) {
            return Err(StoreError::AccountNotFound(account));
        }
        Ok(state.balances.get(&account).copied().unwrap_or(Decimal::ZERO))
    }

    async fn sum_credits(&self, account: AccountNumber) -> StoreResult<Decimal> {
        let state = self.state.read();
        if !state.accounts.contains_key(&account) {
            return Err(StoreError::AccountNotFound(account));
        }
        let total = state
            .log
            .iter()
            .filter(|txn| txn.credits(account))
            .map(|txn| txn.amount)
            .sum();
        debug!(account = %account, total = %total, "Summed credits");
        Ok(total)
    }

    async fn sum_debits(&self, account: AccountNumber) -> StoreResult<Decimal> {
        let state = self.state.read();
        if !state.accounts.contains_key(&account) {
            return Err(StoreError::AccountNotFound(account));
        }
        let total = state
            .log
            .iter()
            .filter(|txn| txn.debits(account))
            .map(|txn| txn.amount)
            .sum();
        debug!(account = %account, total = %total, "Summed debits");
        Ok(total)
    }

    async fn list_transactions(&self, account: AccountNumber) -> StoreResult<Vec<Transaction>> {
        let state = self.state.read();
        if !state.accounts.contains_key(&account) {
            return Err(StoreError::AccountNotFound(account));
        }
        Ok(state
            .log
            .iter()
            .filter(|txn| txn.touches(account))
            .cloned()
            .collect())
    }

    async fn append_transaction(
        &self,
        transaction: Transaction,
        guard: Option<DebitGuard>,
    ) -> StoreResult<Transaction> {
        if !transaction.is_well_formed() {
            return Err(StoreError::InvalidTransaction(format!(
                "{} record with amount {} fails shape invariants",
                transaction.kind, transaction.amount
            )));
        }

        let mut state = self.state.write();

        for side in [transaction.sender, transaction.receiver].into_iter().flatten() {
            if !state.accounts.contains_key(&side) {
                return Err(StoreError::AccountNotFound(side));
            }
        }

        if let Some(guard) = guard {
            let record = state
                .accounts
                .get(&guard.account)
                .ok_or(StoreError::AccountNotFound(guard.account))?;
            if record.version != guard.version {
                warn!(
                    account = %guard.account,
                    expected = guard.version,
                    actual = record.version,
                    "Guarded append lost to concurrent debit"
                );
                return Err(StoreError::VersionConflict {
                    account: guard.account,
                    expected: guard.version,
                    actual: record.version,
                });
            }
        }

        if let Some(sender) = transaction.sender {
            state.debit(sender, transaction.amount);
        }
        if let Some(receiver) = transaction.receiver {
            state.credit(receiver, transaction.amount);
        }
        if let Some(guard) = guard {
            if let Some(record) = state.accounts.get_mut(&guard.account) {
                record.version += 1;
            }
        }
        state.log.push(transaction.clone());

        info!(
            id = %transaction.id,
            kind = %transaction.kind,
            amount = %transaction.amount,
            "Transaction committed"
        );
        Ok(transaction)
    }
}
