//! CoreBank Teller
//!
//! The command surface of the ledger: account opening, deposit, withdrawal,
//! transfer, balance inquiry, and PIN verification, plus the
//! external-collaborator seams (customer directory, credential service,
//! PIN generation) those operations depend on.

pub mod accounts;
pub mod config;
pub mod credential;
pub mod directory;
pub mod metrics;
pub mod pin;
pub mod processor;
pub mod teller;

pub use accounts::{AccountManager, OpenAccountReceipt};
pub use config::TellerConfig;
pub use credential::{CredentialService, SaltedSha256Credentials};
pub use directory::{Customer, CustomerDirectory, InMemoryCustomerDirectory};
pub use metrics::{SharedTellerMetrics, TellerMetrics, TellerMetricsSnapshot};
pub use pin::{FixedPinGenerator, Pin, PinGenerator, SecurePinGenerator};
pub use processor::TransactionProcessor;
pub use teller::Teller;
