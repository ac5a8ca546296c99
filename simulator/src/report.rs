//! End-of-run reporting.

use rust_decimal::Decimal;
use serde::Serialize;
use tracing::info;

use corebank_teller::TellerMetricsSnapshot;

/// Invariant checks evaluated after a scenario run.
#[derive(Debug, Clone, Serialize)]
pub struct InvariantSummary {
    /// Accounts whose running balance matched the derived full-scan value.
    pub accounts_reconciled: usize,
    /// Accounts with drift between running and derived balances.
    pub accounts_with_drift: usize,
    /// Accounts observed below zero.
    pub negative_balances: usize,
    /// Sum of all running balances at the end of the run.
    pub total_funds: Decimal,
    /// What the scenario expected `total_funds` to be.
    pub expected_funds: Decimal,
}

impl InvariantSummary {
    /// True when every invariant held.
    pub fn holds(&self) -> bool {
        self.accounts_with_drift == 0
            && self.negative_balances == 0
            && self.total_funds == self.expected_funds
    }
}

/// Full report for one scenario run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Scenario name.
    pub scenario: String,
    /// Seed the run was driven with.
    pub seed: u64,
    /// Accounts opened for the run.
    pub accounts: usize,
    /// Deposits committed.
    pub deposits_committed: u64,
    /// Withdrawals committed.
    pub withdrawals_committed: u64,
    /// Transfers committed.
    pub transfers_committed: u64,
    /// Operations rejected by validation.
    pub operations_rejected: u64,
    /// Optimistic-commit retries taken.
    pub conflict_retries: u64,
    /// Invariant checks.
    pub invariants: InvariantSummary,
}

impl RunReport {
    /// Assemble a report from the teller counters and invariant summary.
    pub fn new(
        scenario: impl Into<String>,
        seed: u64,
        accounts: usize,
        metrics: &TellerMetricsSnapshot,
        invariants: InvariantSummary,
    ) -> Self {
        Self {
            scenario: scenario.into(),
            seed,
            accounts,
            deposits_committed: metrics.deposits_committed,
            withdrawals_committed: metrics.withdrawals_committed,
            transfers_committed: metrics.transfers_committed,
            operations_rejected: metrics.total_rejected(),
            conflict_retries: metrics.conflict_retries,
            invariants,
        }
    }

    /// Log the report through tracing.
    pub fn log(&self) {
        info!(scenario = %self.scenario, seed = self.seed, "Scenario complete");
        info!(
            deposits = self.deposits_committed,
            withdrawals = self.withdrawals_committed,
            transfers = self.transfers_committed,
            rejected = self.operations_rejected,
            retries = self.conflict_retries,
            "Operation counts"
        );
        info!(
            reconciled = self.invariants.accounts_reconciled,
            drift = self.invariants.accounts_with_drift,
            negative = self.invariants.negative_balances,
            total_funds = %self.invariants.total_funds,
            expected_funds = %self.invariants.expected_funds,
            holds = self.invariants.holds(),
            "Invariant checks"
        );
    }
}
