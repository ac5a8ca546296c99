//! Simulation scenarios.
//!
//! Each scenario drives the teller against an in-memory ledger store and
//! finishes with an invariant sweep: every account reconciles (running
//! balance equals derived), no balance is negative, and total funds match
//! what the workload should have left behind.

use std::sync::Arc;

use anyhow::Context;
use futures::future::join_all;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;
use tracing::{info, warn};

use corebank_common::{AccountNumber, AccountType, SystemClock};
use corebank_ledger::MemoryLedgerStore;
use corebank_teller::{
    InMemoryCustomerDirectory, SaltedSha256Credentials, SecurePinGenerator, Teller, TellerConfig,
};

use crate::report::{InvariantSummary, RunReport};

/// Workload shape a scenario drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenarioKind {
    Baseline,
    Contention,
    TransferStorm,
}

/// A simulation scenario.
#[derive(Debug, Clone)]
pub struct Scenario {
    /// Workload shape.
    pub kind: ScenarioKind,
    /// Scenario name.
    pub name: String,
    /// Description.
    pub description: String,
    /// Accounts to open.
    pub accounts: usize,
    /// Operations to attempt.
    pub operations: usize,
    /// Concurrent workers for the contended scenarios.
    pub concurrency: usize,
}

impl Scenario {
    /// Load a scenario by name.
    pub fn load(name: &str) -> anyhow::Result<Self> {
        match name {
            "baseline" => Ok(Self::baseline()),
            "contention" => Ok(Self::contention()),
            "transfer-storm" => Ok(Self::transfer_storm()),
            _ => Err(anyhow::anyhow!("Unknown scenario: {}", name)),
        }
    }

    /// Sequential mixed workload.
    fn baseline() -> Self {
        Self {
            kind: ScenarioKind::Baseline,
            name: "baseline".to_string(),
            description: "Sequential deposits, withdrawals, and transfers".to_string(),
            accounts: 8,
            operations: 500,
            concurrency: 1,
        }
    }

    /// Many concurrent withdrawals racing for the same balance.
    fn contention() -> Self {
        Self {
            kind: ScenarioKind::Contention,
            name: "contention".to_string(),
            description: "Concurrent withdrawals against one account".to_string(),
            accounts: 1,
            operations: 16,
            concurrency: 16,
        }
    }

    /// Random concurrent transfers across the account set.
    fn transfer_storm() -> Self {
        Self {
            kind: ScenarioKind::TransferStorm,
            name: "transfer-storm".to_string(),
            description: "Concurrent random transfers between accounts".to_string(),
            accounts: 6,
            operations: 400,
            concurrency: 8,
        }
    }

    /// Run the scenario to completion.
    pub async fn run(&self, seed: u64) -> anyhow::Result<RunReport> {
        info!(scenario = %self.name, seed, "{}", self.description);

        let store = Arc::new(MemoryLedgerStore::new());
        let directory = Arc::new(InMemoryCustomerDirectory::new());
        let teller = Arc::new(Teller::new(
            store.clone(),
            directory.clone(),
            Arc::new(SaltedSha256Credentials),
            Arc::new(SecurePinGenerator),
            Arc::new(SystemClock),
            TellerConfig::from_env(),
        ));

        let mut numbers = Vec::with_capacity(self.accounts);
        for index in 0..self.accounts {
            let customer = directory.register(format!("Holder{index}"), "Simulated");
            let receipt = teller
                .open_account(customer, AccountType::Checking)
                .await
                .context("opening simulated account")?;
            numbers.push(receipt.account_number);
        }

        let expected_funds = match self.kind {
            ScenarioKind::Baseline => self.run_baseline(&teller, &numbers, seed).await?,
            ScenarioKind::Contention => self.run_contention(&teller, &numbers).await?,
            ScenarioKind::TransferStorm => {
                self.run_transfer_storm(&teller, &numbers, seed).await?
            }
        };

        let invariants = verify_invariants(&store, &teller, &numbers, expected_funds).await?;
        if !invariants.holds() {
            warn!(scenario = %self.name, "Invariant violation detected");
        }

        Ok(RunReport::new(
            self.name.clone(),
            seed,
            self.accounts,
            &teller.metrics(),
            invariants,
        ))
    }

    /// Sequential mixed operations; tracks the funds the workload should
    /// leave in the ledger.
    async fn run_baseline(
        &self,
        teller: &Teller,
        numbers: &[AccountNumber],
        seed: u64,
    ) -> anyhow::Result<Decimal> {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut expected = Decimal::ZERO;

        for _ in 0..self.operations {
            let amount = Decimal::from(rng.gen_range(1..500u32));
            let from = numbers[rng.gen_range(0..numbers.len())];
            match rng.gen_range(0..3u8) {
                0 => {
                    if teller.deposit(from, amount).await.is_ok() {
                        expected += amount;
                    }
                }
                1 => {
                    if teller.withdraw(from, amount).await.is_ok() {
                        expected -= amount;
                    }
                }
                _ => {
                    let mut to = numbers[rng.gen_range(0..numbers.len())];
                    while to == from {
                        to = numbers[rng.gen_range(0..numbers.len())];
                    }
                    // Transfers conserve total funds whether or not they
                    // commit.
                    let _ = teller.transfer(from, to, amount).await;
                }
            }
        }

        Ok(expected)
    }

    /// Fund one account with exactly one withdrawal's worth and race the
    /// workers for it; exactly one should win.
    async fn run_contention(
        &self,
        teller: &Arc<Teller>,
        numbers: &[AccountNumber],
    ) -> anyhow::Result<Decimal> {
        let account = numbers[0];
        let amount = Decimal::from(100);
        teller.deposit(account, amount).await?;

        let tasks: Vec<_> = (0..self.concurrency)
            .map(|_| {
                let teller = teller.clone();
                tokio::spawn(async move { teller.withdraw(account, amount).await })
            })
            .collect();

        let outcomes: Vec<_> = join_all(tasks)
            .await
            .into_iter()
            .collect::<Result<_, _>>()
            .context("joining withdrawal workers")?;

        let successes = outcomes.iter().filter(|r| r.is_ok()).count();
        info!(workers = self.concurrency, successes, "Contention round finished");
        if successes != 1 {
            anyhow::bail!("expected exactly one winning withdrawal, saw {successes}");
        }

        Ok(Decimal::ZERO)
    }

    /// Concurrent random transfers; total funds must be exactly what was
    /// seeded.
    async fn run_transfer_storm(
        &self,
        teller: &Arc<Teller>,
        numbers: &[AccountNumber],
        seed: u64,
    ) -> anyhow::Result<Decimal> {
        let seed_per_account = Decimal::from(1000);
        for &number in numbers {
            teller.deposit(number, seed_per_account).await?;
        }
        let expected = seed_per_account * Decimal::from(numbers.len() as u32);

        let per_worker = self.operations / self.concurrency;
        let tasks: Vec<_> = (0..self.concurrency)
            .map(|worker| {
                let teller = teller.clone();
                let numbers = numbers.to_vec();
                let mut rng = StdRng::seed_from_u64(seed.wrapping_add(worker as u64));
                tokio::spawn(async move {
                    for _ in 0..per_worker {
                        let from = numbers[rng.gen_range(0..numbers.len())];
                        let mut to = numbers[rng.gen_range(0..numbers.len())];
                        while to == from {
                            to = numbers[rng.gen_range(0..numbers.len())];
                        }
                        let amount = Decimal::from(rng.gen_range(1..300u32));
                        // Rejections (insufficient funds, retry exhaustion)
                        // are part of the workload.
                        let _ = teller.transfer(from, to, amount).await;
                    }
                })
            })
            .collect();

        join_all(tasks)
            .await
            .into_iter()
            .collect::<Result<Vec<()>, _>>()
            .context("joining transfer workers")?;

        Ok(expected)
    }
}

/// Sweep every account: reconcile running against derived balances, flag
/// negatives, and compare total funds with the scenario's expectation.
async fn verify_invariants(
    store: &MemoryLedgerStore,
    teller: &Teller,
    numbers: &[AccountNumber],
    expected_funds: Decimal,
) -> anyhow::Result<InvariantSummary> {
    let mut reconciled = 0;
    let mut drifted = 0;
    let mut negative = 0;

    for &number in numbers {
        let report = teller
            .reconcile_account(number)
            .await
            .context("reconciling account")?;
        if report.is_clean() {
            reconciled += 1;
        } else {
            warn!(account = %number, drift = %report.drift, "Running balance drifted from log");
            drifted += 1;
        }
        if report.running < Decimal::ZERO {
            warn!(account = %number, balance = %report.running, "Negative balance");
            negative += 1;
        }
    }

    Ok(InvariantSummary {
        accounts_reconciled: reconciled,
        accounts_with_drift: drifted,
        negative_balances: negative,
        total_funds: store.total_funds(),
        expected_funds,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_maps_names_to_kinds() {
        assert_eq!(Scenario::load("baseline").unwrap().kind, ScenarioKind::Baseline);
        assert_eq!(Scenario::load("contention").unwrap().kind, ScenarioKind::Contention);
        assert_eq!(
            Scenario::load("transfer-storm").unwrap().kind,
            ScenarioKind::TransferStorm
        );
        assert!(Scenario::load("turbo").is_err());
    }
}
