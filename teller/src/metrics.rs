//! Operation counters for the teller.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Teller metrics.
pub struct TellerMetrics {
    /// Accounts opened.
    pub accounts_opened: AtomicU64,
    /// Deposits committed.
    pub deposits_committed: AtomicU64,
    /// Deposits rejected.
    pub deposits_rejected: AtomicU64,
    /// Withdrawals committed.
    pub withdrawals_committed: AtomicU64,
    /// Withdrawals rejected.
    pub withdrawals_rejected: AtomicU64,
    /// Transfers committed.
    pub transfers_committed: AtomicU64,
    /// Transfers rejected.
    pub transfers_rejected: AtomicU64,
    /// Optimistic-commit retries taken after a version conflict.
    pub conflict_retries: AtomicU64,
}

impl TellerMetrics {
    /// Create new metrics instance.
    pub fn new() -> Self {
        Self {
            accounts_opened: AtomicU64::new(0),
            deposits_committed: AtomicU64::new(0),
            deposits_rejected: AtomicU64::new(0),
            withdrawals_committed: AtomicU64::new(0),
            withdrawals_rejected: AtomicU64::new(0),
            transfers_committed: AtomicU64::new(0),
            transfers_rejected: AtomicU64::new(0),
            conflict_retries: AtomicU64::new(0),
        }
    }

    /// Record an account opening.
    pub fn account_opened(&self) {
        self.accounts_opened.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a committed deposit.
    pub fn deposit_committed(&self) {
        self.deposits_committed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a rejected deposit.
    pub fn deposit_rejected(&self) {
        self.deposits_rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a committed withdrawal.
    pub fn withdrawal_committed(&self) {
        self.withdrawals_committed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a rejected withdrawal.
    pub fn withdrawal_rejected(&self) {
        self.withdrawals_rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a committed transfer.
    pub fn transfer_committed(&self) {
        self.transfers_committed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a rejected transfer.
    pub fn transfer_rejected(&self) {
        self.transfers_rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a conflict retry.
    pub fn conflict_retry(&self) {
        self.conflict_retries.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current metrics snapshot.
    pub fn snapshot(&self) -> TellerMetricsSnapshot {
        TellerMetricsSnapshot {
            accounts_opened: self.accounts_opened.load(Ordering::Relaxed),
            deposits_committed: self.deposits_committed.load(Ordering::Relaxed),
            deposits_rejected: self.deposits_rejected.load(Ordering::Relaxed),
            withdrawals_committed: self.withdrawals_committed.load(Ordering::Relaxed),
            withdrawals_rejected: self.withdrawals_rejected.load(Ordering::Relaxed),
            transfers_committed: self.transfers_committed.load(Ordering::Relaxed),
            transfers_rejected: self.transfers_rejected.load(Ordering::Relaxed),
            conflict_retries: self.conflict_retries.load(Ordering::Relaxed),
        }
    }
}

impl Default for TellerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of metrics at a point in time.
#[derive(Debug, Clone)]
pub struct TellerMetricsSnapshot {
    pub accounts_opened: u64,
    pub deposits_committed: u64,
    pub deposits_rejected: u64,
    pub withdrawals_committed: u64,
    pub withdrawals_rejected: u64,
    pub transfers_committed: u64,
    pub transfers_rejected: u64,
    pub conflict_retries: u64,
}

impl TellerMetricsSnapshot {
    /// Total committed operations of all kinds.
    pub fn total_committed(&self) -> u64 {
        self.deposits_committed + self.withdrawals_committed + self.transfers_committed
    }

    /// Total rejected operations of all kinds.
    pub fn total_rejected(&self) -> u64 {
        self.deposits_rejected + self.withdrawals_rejected + self.transfers_rejected
    }
}

/// Shared metrics instance.
pub type SharedTellerMetrics = Arc<TellerMetrics>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_increment() {
        let metrics = TellerMetrics::new();

        metrics.deposit_committed();
        metrics.deposit_committed();
        metrics.withdrawal_rejected();
        metrics.conflict_retry();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.deposits_committed, 2);
        assert_eq!(snapshot.withdrawals_rejected, 1);
        assert_eq!(snapshot.conflict_retries, 1);
        assert_eq!(snapshot.total_committed(), 2);
        assert_eq!(snapshot.total_rejected(), 1);
    }
}
