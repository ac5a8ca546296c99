//! Customer directory seam.
//!
//! Customer records live outside the ledger; the teller only needs to
//! resolve identity when opening an account. Deployments plug their own
//! directory in behind the trait; the in-memory registry serves tests and
//! the simulator.

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use corebank_common::CustomerId;

/// A customer as the directory knows them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Customer {
    /// Directory identity.
    pub id: CustomerId,
    /// Given name.
    pub first_name: String,
    /// Family name.
    pub last_name: String,
}

impl Customer {
    /// Create a customer record.
    pub fn new(id: CustomerId, first_name: impl Into<String>, last_name: impl Into<String>) -> Self {
        Self {
            id,
            first_name: first_name.into(),
            last_name: last_name.into(),
        }
    }

    /// Name as printed on account receipts: "Last, First".
    pub fn account_name(&self) -> String {
        format!("{}, {}", self.last_name, self.first_name)
    }
}

/// External collaborator resolving customer identity.
#[async_trait]
pub trait CustomerDirectory: Send + Sync {
    /// Check whether the customer exists.
    async fn exists(&self, id: CustomerId) -> bool;

    /// Fetch the customer record.
    async fn get(&self, id: CustomerId) -> Option<Customer>;
}

/// In-memory directory registry.
pub struct InMemoryCustomerDirectory {
    customers: DashMap<CustomerId, Customer>,
}

impl InMemoryCustomerDirectory {
    /// Create an empty directory.
    pub fn new() -> Self {
        Self {
            customers: DashMap::new(),
        }
    }

    /// Register a customer, returning their ID.
    pub fn register(&self, first_name: impl Into<String>, last_name: impl Into<String>) -> CustomerId {
        let id = CustomerId::new();
        self.customers
            .insert(id, Customer::new(id, first_name, last_name));
        id
    }

    /// Insert an existing customer record.
    pub fn insert(&self, customer: Customer) {
        self.customers.insert(customer.id, customer);
    }
}

impl Default for InMemoryCustomerDirectory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CustomerDirectory for InMemoryCustomerDirectory {
    async fn exists(&self, id: CustomerId) -> bool {
        self.customers.contains_key(&id)
    }

    async fn get(&self, id: CustomerId) -> Option<Customer> {
        self.customers.get(&id).map(|c| c.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_registered_customer_resolves() {
        let directory = InMemoryCustomerDirectory::new();
        let id = directory.register("Ada", "Lovelace");

        assert!(directory.exists(id).await);
        let customer = directory.get(id).await.unwrap();
        assert_eq!(customer.account_name(), "Lovelace, Ada");
    }

    #[tokio::test]
    async fn test_unknown_customer_is_absent() {
        let directory = InMemoryCustomerDirectory::new();
        let id = CustomerId::new();
        assert!(!directory.exists(id).await);
        assert!(directory.get(id).await.is_none());
    }
}
