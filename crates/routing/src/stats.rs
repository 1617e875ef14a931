//! Engine counters for in-process reporting

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Lock-free counters shared by the calculator and the dispatcher
#[derive(Debug, Default)]
pub struct EngineStats {
    /// Calculations that published a table
    calculations: AtomicU64,
    /// Calculations that panicked
    failed_calculations: AtomicU64,
    /// Adapters that fell back to broadcast after a readiness timeout
    readiness_timeouts: AtomicU64,
    /// Measurements handed to dispatch
    measurements: AtomicU64,
    /// Successful adapter deliveries
    deliveries: AtomicU64,
    /// Deliveries that returned an error or panicked
    delivery_failures: AtomicU64,
}

impl EngineStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calculations(&self) -> u64 {
        self.calculations.load(Ordering::Relaxed)
    }

    pub fn inc_calculations(&self) {
        self.calculations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn failed_calculations(&self) -> u64 {
        self.failed_calculations.load(Ordering::Relaxed)
    }

    pub fn inc_failed_calculations(&self) {
        self.failed_calculations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_readiness_timeouts(&self, n: u64) {
        self.readiness_timeouts.fetch_add(n, Ordering::Relaxed);
    }

    /// Fold one dispatch call into the totals
    pub fn record_dispatch(&self, summary: &DispatchSummary) {
        self.measurements
            .fetch_add(summary.measurements as u64, Ordering::Relaxed);
        self.deliveries
            .fetch_add(summary.deliveries as u64, Ordering::Relaxed);
        self.delivery_failures
            .fetch_add(summary.failures as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            calculations: self.calculations(),
            failed_calculations: self.failed_calculations(),
            readiness_timeouts: self.readiness_timeouts.load(Ordering::Relaxed),
            measurements: self.measurements.load(Ordering::Relaxed),
            deliveries: self.deliveries.load(Ordering::Relaxed),
            delivery_failures: self.delivery_failures.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`EngineStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub calculations: u64,
    pub failed_calculations: u64,
    pub readiness_timeouts: u64,
    pub measurements: u64,
    pub deliveries: u64,
    pub delivery_failures: u64,
}

impl std::fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Routing Engine Stats ===")?;
        writeln!(
            f,
            "Calculations: {} published, {} failed, {} readiness timeouts",
            self.calculations, self.failed_calculations, self.readiness_timeouts
        )?;
        writeln!(
            f,
            "Dispatch: {} measurements, {} deliveries, {} failures",
            self.measurements, self.deliveries, self.delivery_failures
        )
    }
}

/// Outcome of one dispatch call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatchSummary {
    /// Measurements in the input batch
    pub measurements: usize,
    /// Adapter `accept` calls that succeeded
    pub deliveries: usize,
    /// Adapter `accept` calls that failed or panicked
    pub failures: usize,
    /// Matched adapters skipped because they were disabled
    pub skipped_disabled: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_accumulates() {
        let stats = EngineStats::new();
        stats.inc_calculations();
        stats.inc_calculations();
        stats.inc_failed_calculations();
        stats.add_readiness_timeouts(3);
        stats.record_dispatch(&DispatchSummary {
            measurements: 4,
            deliveries: 2,
            failures: 1,
            skipped_disabled: 5,
        });

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.calculations, 2);
        assert_eq!(snapshot.failed_calculations, 1);
        assert_eq!(snapshot.readiness_timeouts, 3);
        assert_eq!(snapshot.measurements, 4);
        assert_eq!(snapshot.deliveries, 2);
        assert_eq!(snapshot.delivery_failures, 1);
        assert!(snapshot.to_string().contains("2 published"));
    }
}
