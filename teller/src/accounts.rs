//! Account lifecycle management.

use std::sync::Arc;

use tracing::{info, instrument, warn};

use corebank_common::{Account, AccountNumber, AccountType, BankError, Clock, CustomerId, Result};
use corebank_ledger::{LedgerStore, NewAccount};

use crate::credential::CredentialService;
use crate::directory::CustomerDirectory;
use crate::pin::{Pin, PinGenerator};

/// Result of opening an account. The PIN is plaintext, shown once here and
/// never persisted.
#[derive(Debug, Clone)]
pub struct OpenAccountReceipt {
    /// Assigned account number.
    pub account_number: AccountNumber,
    /// Holder name as "Last, First".
    pub account_name: String,
    /// Product variant.
    pub account_type: AccountType,
    /// Plaintext PIN for the holder.
    pub pin: Pin,
}

/// Creates accounts: resolves the customer, generates and hashes the PIN,
/// and persists the new Active account.
pub struct AccountManager {
    store: Arc<dyn LedgerStore>,
    directory: Arc<dyn CustomerDirectory>,
    credentials: Arc<dyn CredentialService>,
    pin_generator: Arc<dyn PinGenerator>,
    clock: Arc<dyn Clock>,
}

impl AccountManager {
    /// Create a new account manager.
    pub fn new(
        store: Arc<dyn LedgerStore>,
        directory: Arc<dyn CustomerDirectory>,
        credentials: Arc<dyn CredentialService>,
        pin_generator: Arc<dyn PinGenerator>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            directory,
            credentials,
            pin_generator,
            clock,
        }
    }

    /// Open an account for a customer.
    #[instrument(skip(self), fields(customer = %customer_id, account_type = %account_type))]
    pub async fn open_account(
        &self,
        customer_id: CustomerId,
        account_type: AccountType,
    ) -> Result<OpenAccountReceipt> {
        let Some(customer) = self.directory.get(customer_id).await else {
            warn!(customer = %customer_id, "Customer not found in directory");
            return Err(BankError::CustomerNotFound(customer_id));
        };

        let pin = self.pin_generator.generate();
        let pin_hash = self.credentials.hash(pin.expose());

        let account = self
            .store
            .create_account(NewAccount {
                customer_id,
                account_type,
                pin_hash,
                created_at: self.clock.now(),
            })
            .await?;

        info!(
            account = %account.account_number,
            customer = %customer_id,
            "Account opened"
        );

        Ok(OpenAccountReceipt {
            account_number: account.account_number,
            account_name: customer.account_name(),
            account_type: account.account_type,
            pin,
        })
    }

    /// Fetch an account, surfacing `AccountNotFound` when absent.
    pub async fn require_account(&self, account: AccountNumber) -> Result<Account> {
        self.store
            .get_account(account)
            .await
            .map_err(BankError::from)?
            .ok_or(BankError::AccountNotFound(account))
    }
}
