//! PostgreSQL-backed ledger store.
//!
//! Same protocol as the in-memory store, with the version-token check
//! executed server-side: a guarded debit runs a conditional
//! `UPDATE ... WHERE version = $n` inside the same database transaction as
//! the log insert, so a concurrent debit on the account forces this commit
//! to abort with `VersionConflict` and nothing is written.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgRow};
use sqlx::{Executor, PgPool, Row};
use tracing::{debug, info};

use corebank_common::{
    Account, AccountNumber, AccountStatus, AccountType, CustomerId, PinHash, Transaction,
    TransactionId, TransactionKind,
};

use crate::store::{DebitGuard, LedgerStore, NewAccount, StoreError, StoreResult};

const SCHEMA: &str = include_str!("../schema.sql");

/// PostgreSQL connection settings.
#[derive(Debug, Clone)]
pub struct PgStoreConfig {
    /// Database connection URL.
    pub database_url: String,
    /// Maximum pool connections.
    pub max_connections: u32,
    /// How long to wait for a pool connection before failing.
    pub acquire_timeout: Duration,
    /// Server-side statement timeout.
    pub statement_timeout: Duration,
}

impl Default for PgStoreConfig {
    fn default() -> Self {
        Self {
            database_url: "postgres://localhost/corebank".to_string(),
            max_connections: 16,
            acquire_timeout: Duration::from_secs(5),
            statement_timeout: Duration::from_secs(5),
        }
    }
}

impl PgStoreConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(url) = std::env::var("COREBANK_DATABASE_URL") {
            config.database_url = url;
        }

        if let Ok(connections) = std::env::var("COREBANK_PG_MAX_CONNECTIONS") {
            if let Ok(connections) = connections.parse() {
                config.max_connections = connections;
            }
        }

        if let Ok(ms) = std::env::var("COREBANK_PG_STATEMENT_TIMEOUT_MS") {
            if let Ok(ms) = ms.parse() {
                config.statement_timeout = Duration::from_millis(ms);
            }
        }

        config
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.database_url.is_empty() {
            return Err("Database URL cannot be empty".to_string());
        }
        if self.max_connections == 0 {
            return Err("Pool must allow at least one connection".to_string());
        }
        Ok(())
    }
}

/// `LedgerStore` backed by PostgreSQL via sqlx.
pub struct PgLedgerStore {
    pool: PgPool,
}

impl PgLedgerStore {
    /// Connect a pool using the given configuration.
    pub async fn connect(config: &PgStoreConfig) -> StoreResult<Self> {
        let statement_timeout_ms = config.statement_timeout.as_millis().to_string();
        let options = PgConnectOptions::from_str(&config.database_url)
            .map_err(map_sqlx_err)?
            .options([("statement_timeout", statement_timeout_ms.as_str())]);

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout)
            .connect_with(options)
            .await
            .map_err(map_sqlx_err)?;

        info!(max_connections = config.max_connections, "Connected ledger pool");
        Ok(Self { pool })
    }

    /// Wrap an existing pool.
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Apply the ledger schema. Idempotent.
    pub async fn init_schema(&self) -> StoreResult<()> {
        self.pool.execute(SCHEMA).await.map_err(map_sqlx_err)?;
        info!("Ledger schema applied");
        Ok(())
    }

    async fn account_exists<'e, E>(executor: E, account: AccountNumber) -> StoreResult<bool>
    where
        E: Executor<'e, Database = sqlx::Postgres>,
    {
        let row = sqlx::query("SELECT 1 FROM accounts WHERE account_number = $1")
            .bind(i64::from(account))
            .fetch_optional(executor)
            .await
            .map_err(map_sqlx_err)?;
        Ok(row.is_some())
    }
}

fn map_sqlx_err(err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::PoolTimedOut => StoreError::Timeout("connection acquire".to_string()),
        other => StoreError::Unavailable(other.to_string()),
    }
}

fn corrupt_row(detail: &str) -> StoreError {
    StoreError::Unavailable(format!("corrupt row: {detail}"))
}

fn account_number_from(raw: i64) -> StoreResult<AccountNumber> {
    u32::try_from(raw)
        .map(AccountNumber::new)
        .map_err(|_| corrupt_row("account number out of range"))
}

fn account_from_row(row: &PgRow) -> StoreResult<Account> {
    let number = account_number_from(row.try_get("account_number").map_err(map_sqlx_err)?)?;
    let account_type: String = row.try_get("account_type").map_err(map_sqlx_err)?;
    let status: String = row.try_get("status").map_err(map_sqlx_err)?;
    let version: i64 = row.try_get("version").map_err(map_sqlx_err)?;

    Ok(Account {
        account_number: number,
        customer_id: CustomerId::from_uuid(row.try_get("customer_id").map_err(map_sqlx_err)?),
        account_type: AccountType::parse(&account_type)
            .ok_or_else(|| corrupt_row("unknown account type"))?,
        pin_hash: PinHash::new(row.try_get::<String, _>("pin_hash").map_err(map_sqlx_err)?),
        status: AccountStatus::parse(&status).ok_or_else(|| corrupt_row("unknown status"))?,
        version: version as u64,
        created_at: row.try_get("created_at").map_err(map_sqlx_err)?,
    })
}

fn transaction_from_row(row: &PgRow) -> StoreResult<Transaction> {
    let kind: String = row.try_get("kind").map_err(map_sqlx_err)?;
    let sender: Option<i64> = row.try_get("sender").map_err(map_sqlx_err)?;
    let receiver: Option<i64> = row.try_get("receiver").map_err(map_sqlx_err)?;

    Ok(Transaction {
        id: TransactionId::from_uuid(row.try_get("id").map_err(map_sqlx_err)?),
        kind: TransactionKind::parse(&kind).ok_or_else(|| corrupt_row("unknown kind"))?,
        sender: sender.map(account_number_from).transpose()?,
        receiver: receiver.map(account_number_from).transpose()?,
        amount: row.try_get("amount").map_err(map_sqlx_err)?,
        created_at: row.try_get("created_at").map_err(map_sqlx_err)?,
    })
}

#[async_trait]
impl LedgerStore for PgLedgerStore {
    async fn get_account(&self, account: AccountNumber) -> StoreResult<Option<Account>> {
        let row = sqlx::query(
            "SELECT account_number, customer_id, account_type, pin_hash, status, version, \
             created_at FROM accounts WHERE account_number = $1",
        )
        .bind(i64::from(account))
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        row.as_ref().map(account_from_row).transpose()
    }

    async fn create_account(&self, new_account: NewAccount) -> StoreResult<Account> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_err)?;

        let row = sqlx::query(
            "INSERT INTO accounts (customer_id, account_type, pin_hash, status, version, \
             created_at) VALUES ($1, $2, $3, $4, 0, $5) RETURNING account_number",
        )
        .bind(new_account.customer_id.as_uuid())
        .bind(new_account.account_type.as_str())
        .bind(new_account.pin_hash.as_str())
        .bind(AccountStatus::Active.as_str())
        .bind(new_account.created_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_sqlx_err)?;

        let number = account_number_from(row.try_get("account_number").map_err(map_sqlx_err)?)?;

        sqlx::query("INSERT INTO account_balances (account_number, balance) VALUES ($1, 0)")
            .bind(i64::from(number))
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_err)?;

        tx.commit().await.map_err(map_sqlx_err)?;

        info!(account = %number, customer = %new_account.customer_id, "Account created");
        Ok(Account::new(
            number,
            new_account.customer_id,
            new_account.account_type,
            new_account.pin_hash,
            new_account.created_at,
        ))
    }

    async fn set_account_status(
        &self,
        account: AccountNumber,
        status: AccountStatus,
    ) -> StoreResult<Account> {
        let row = sqlx::query(
            "UPDATE accounts SET status = $2 WHERE account_number = $1 RETURNING \
             account_number, customer_id, account_type, pin_hash, status, version, created_at",
        )
        .bind(i64::from(account))
        .bind(status.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        let row = row.ok_or(StoreError::AccountNotFound(account))?;
        info!(account = %account, status = %status, "Account status changed");
        account_from_row(&row)
    }

    async fn balance(&self, account: AccountNumber) -> StoreResult<Decimal> {
        let row = sqlx::query(
            "SELECT COALESCE(b.balance, 0) AS balance FROM accounts a \
             LEFT JOIN account_balances b ON b.account_number = a.account_number \
             WHERE a.account_number = $1",
        )
        .bind(i64::from(account))
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        let row = row.ok_or(StoreError::AccountNotFound(account))?;
        row.try_get("balance").map_err(map_sqlx_err)
    }

    async fn sum_credits(&self, account: AccountNumber) -> StoreResult<Decimal> {
        if !Self::account_exists(&self.pool, account).await? {
            return Err(StoreError::AccountNotFound(account));
        }
        let row = sqlx::query(
            "SELECT COALESCE(SUM(amount), 0) AS total FROM transactions WHERE receiver = $1",
        )
        .bind(i64::from(account))
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_err)?;
        let total = row.try_get("total").map_err(map_sqlx_err)?;
        debug!(account = %account, total = %total, "Summed credits");
        Ok(total)
    }

    async fn sum_debits(&self, account: AccountNumber) -> StoreResult<Decimal> {
        if !Self::account_exists(&self.pool, account).await? {
            return Err(StoreError::AccountNotFound(account));
        }
        let row = sqlx::query(
            "SELECT COALESCE(SUM(amount), 0) AS total FROM transactions WHERE sender = $1",
        )
        .bind(i64::from(account))
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_err)?;
        let total = row.try_get("total").map_err(map_sqlx_err)?;
        debug!(account = %account, total = %total, "Summed debits");
        Ok(total)
    }

    async fn list_transactions(&self, account: AccountNumber) -> StoreResult<Vec<Transaction>> {
        if !Self::account_exists(&self.pool, account).await? {
            return Err(StoreError::AccountNotFound(account));
        }
        let rows = sqlx::query(
            "SELECT id, kind, sender, receiver, amount, created_at FROM transactions \
             WHERE sender = $1 OR receiver = $1 ORDER BY created_at, id",
        )
        .bind(i64::from(account))
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        rows.iter().map(transaction_from_row).collect()
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

        let mut tx = self.pool.begin().await.map_err(map_sqlx_err)?;

        for side in [transaction.sender, transaction.receiver].into_iter().flatten() {
            if !Self::account_exists(&mut *tx, side).await? {
                return Err(StoreError::AccountNotFound(side));
            }
        }

        if let Some(guard) = guard {
            let updated = sqlx::query(
                "UPDATE accounts SET version = version + 1 \
                 WHERE account_number = $1 AND version = $2",
            )
            .bind(i64::from(guard.account))
            .bind(guard.version as i64)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_err)?;

            if updated.rows_affected() == 0 {
                let current = sqlx::query("SELECT version FROM accounts WHERE account_number = $1")
                    .bind(i64::from(guard.account))
                    .fetch_optional(&mut *tx)
                    .await
                    .map_err(map_sqlx_err)?;
                return Err(match current {
                    Some(row) => StoreError::VersionConflict {
                        account: guard.account,
                        expected: guard.version,
                        actual: row.try_get::<i64, _>("version").map_err(map_sqlx_err)? as u64,
                    },
                    None => StoreError::AccountNotFound(guard.account),
                });
            }
        }

        sqlx::query(
            "INSERT INTO transactions (id, kind, sender, receiver, amount, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(transaction.id.as_uuid())
        .bind(transaction.kind.as_str())
        .bind(transaction.sender.map(i64::from))
        .bind(transaction.receiver.map(i64::from))
        .bind(transaction.amount)
        .bind(transaction.created_at)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_err)?;

        if let Some(sender) = transaction.sender {
            sqlx::query(
                "UPDATE account_balances SET balance = balance - $2 WHERE account_number = $1",
            )
            .bind(i64::from(sender))
            .bind(transaction.amount)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_err)?;
        }
        if let Some(receiver) = transaction.receiver {
            sqlx::query(
                "UPDATE account_balances SET balance = balance + $2 WHERE account_number = $1",
            )
            .bind(i64::from(receiver))
            .bind(transaction.amount)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_err)?;
        }

        tx.commit().await.map_err(map_sqlx_err)?;

        info!(
            id = %transaction.id,
            kind = %transaction.kind,
            amount = %transaction.amount,
            "Transaction committed"
        );
        Ok(transaction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(PgStoreConfig::default().validate().is_ok());
    }

    #[test]
    fn test_empty_url_is_rejected() {
        let mut config = PgStoreConfig::default();
        config.database_url = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_connections_is_rejected() {
        let mut config = PgStoreConfig::default();
        config.max_connections = 0;
        assert!(config.validate().is_err());
    }
}
