//! Metrics collection for observability
//!
//! # Metrics
//!
//! - `pension_entries_total` - Total ledger entries appended
//! - `pension_transfers_total` - Completed transfers
//! - `pension_withdrawals_total` - Completed withdrawals
//! - `pension_rejected_ops_total` - Operations rejected at validation
//! - `pension_mirror_failures_total` - Failed chain-mirror attempts
//! - `pension_append_duration_seconds` - Histogram of append latencies

use prometheus::{Histogram, HistogramOpts, IntCounter, Registry};
use std::sync::Arc;

/// Metrics collector
///
/// Each collector owns its registry, so test ledgers never collide on
/// metric registration.
#[derive(Clone)]
pub struct Metrics {
    /// Total entries appended
    pub entries_total: IntCounter,

    /// Completed transfers
    pub transfers_total: IntCounter,

    /// Completed withdrawals
    pub withdrawals_total: IntCounter,

    /// Operations rejected at validation
    pub rejected_ops_total: IntCounter,

    /// Failed chain-mirror attempts
    pub mirror_failures_total: IntCounter,

    /// Append duration histogram
    pub append_duration: Histogram,

    /// Prometheus registry
    registry: Arc<Registry>,
}

impl Metrics {
    /// Create new metrics collector with its own registry
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let entries_total =
            IntCounter::new("pension_entries_total", "Total ledger entries appended")?;
        registry.register(Box::new(entries_total.clone()))?;

        let transfers_total =
            IntCounter::new("pension_transfers_total", "Completed transfers")?;
        registry.register(Box::new(transfers_total.clone()))?;

        let withdrawals_total =
            IntCounter::new("pension_withdrawals_total", "Completed withdrawals")?;
        registry.register(Box::new(withdrawals_total.clone()))?;

        let rejected_ops_total = IntCounter::new(
            "pension_rejected_ops_total",
            "Operations rejected at validation",
        )?;
        registry.register(Box::new(rejected_ops_total.clone()))?;

        let mirror_failures_total = IntCounter::new(
            "pension_mirror_failures_total",
            "Failed chain-mirror attempts",
        )?;
        registry.register(Box::new(mirror_failures_total.clone()))?;

        let append_duration = Histogram::with_opts(
            HistogramOpts::new(
                "pension_append_duration_seconds",
                "Histogram of append latencies",
            )
            .buckets(vec![0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0]),
        )?;
        registry.register(Box::new(append_duration.clone()))?;

        Ok(Self {
            entries_total,
            transfers_total,
            withdrawals_total,
            rejected_ops_total,
            mirror_failures_total,
            append_duration,
            registry,
        })
    }

    /// Record appended entries
    pub fn record_entries_appended(&self, count: usize) {
        self.entries_total.inc_by(count as u64);
    }

    /// Record a completed transfer
    pub fn record_transfer(&self) {
        self.transfers_total.inc();
    }

    /// Record a completed withdrawal
    pub fn record_withdrawal(&self) {
        self.withdrawals_total.inc();
    }

    /// Record a validation rejection
    pub fn record_rejection(&self) {
        self.rejected_ops_total.inc();
    }

    /// Record a failed mirror attempt
    pub fn record_mirror_failure(&self) {
        self.mirror_failures_total.inc();
    }

    /// Record append duration
    pub fn record_append_duration(&self, duration_seconds: f64) {
        self.append_duration.observe(duration_seconds);
    }

    /// Get metrics registry (for scraping)
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new().expect("Failed to create metrics")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let metrics = Metrics::new().unwrap();
        assert_eq!(metrics.entries_total.get(), 0);
        assert_eq!(metrics.transfers_total.get(), 0);
    }

    #[test]
    fn test_independent_registries() {
        // Two collectors must not collide on registration
        let a = Metrics::new().unwrap();
        let b = Metrics::new().unwrap();
        a.record_transfer();
        assert_eq!(a.transfers_total.get(), 1);
        assert_eq!(b.transfers_total.get(), 0);
    }

    #[test]
    fn test_record_entries_appended() {
        let metrics = Metrics::new().unwrap();
        metrics.record_entries_appended(3);
        metrics.record_entries_appended(2);
        assert_eq!(metrics.entries_total.get(), 5);
    }

    #[test]
    fn test_record_mirror_failure() {
        let metrics = Metrics::new().unwrap();
        metrics.record_mirror_failure();
        assert_eq!(metrics.mirror_failures_total.get(), 1);
    }
}
