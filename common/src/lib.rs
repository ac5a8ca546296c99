//! CoreBank Common Types
//!
//! This crate contains shared types used across the CoreBank ledger,
//! including identifiers, account and transaction records, the error
//! taxonomy, and clock injection.

pub mod account;
pub mod error;
pub mod identifiers;
pub mod time;
pub mod transaction;

pub use account::*;
pub use error::*;
pub use identifiers::*;
pub use time::*;
pub use transaction::*;
