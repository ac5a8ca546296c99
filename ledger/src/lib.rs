//! CoreBank Ledger
//!
//! Durable storage for accounts and the append-only transaction log, plus
//! the balance derivation and reconciliation functions that read it. Two
//! store implementations share one optimistic version-token protocol:
//! `MemoryLedgerStore` for tests and the simulator, and `PgLedgerStore`
//! for PostgreSQL deployments.

pub mod balance;
pub mod memory;
pub mod postgres;
pub mod store;

pub use balance::{derived_balance, reconcile, ReconcileReport};
pub use memory::MemoryLedgerStore;
pub use postgres::{PgLedgerStore, PgStoreConfig};
pub use store::{DebitGuard, LedgerStore, NewAccount, StoreError, StoreResult};
