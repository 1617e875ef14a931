//! Routing engine metrics
//!
//! Thin recorders over the `metrics` facade plus an in-memory aggregator
//! for end-of-run summaries.

use std::time::Duration;

use contracts::{AdapterRole, DispatchMode};
use metrics::{counter, gauge, histogram};

/// Shape of a freshly published route table
#[derive(Debug, Clone, Copy, Default)]
pub struct TableShape {
    /// Distinct keys with at least one processor or sink route
    pub route_keys: usize,
    /// Processors receiving every measurement
    pub processor_broadcast: usize,
    /// Sinks receiving every measurement
    pub sink_broadcast: usize,
}

/// Record one route calculation.
///
/// Called once per calculation, whether it published a table or failed.
pub fn record_calculation(success: bool, elapsed: Duration, shape: &TableShape) {
    let status = if success { "ok" } else { "failed" };
    counter!("router_calculations_total", "status" => status).increment(1);
    histogram!("router_calculation_duration_ms").record(elapsed.as_secs_f64() * 1000.0);

    if success {
        gauge!("router_route_keys").set(shape.route_keys as f64);
        gauge!("router_broadcast_routes", "role" => "processor")
            .set(shape.processor_broadcast as f64);
        gauge!("router_broadcast_routes", "role" => "sink").set(shape.sink_broadcast as f64);
    }
}

/// Record an adapter that missed its readiness deadline
pub fn record_readiness_timeout(adapter: &str, role: AdapterRole) {
    counter!(
        "router_readiness_timeouts_total",
        "adapter" => adapter.to_string(),
        "role" => role.as_str()
    )
    .increment(1);
}

/// Record a demand-driven enable/disable decision
pub fn record_adapter_state_change(role: AdapterRole, enabled: bool) {
    let enabled = if enabled { "true" } else { "false" };
    counter!(
        "router_adapter_state_changes_total",
        "role" => role.as_str(),
        "enabled" => enabled
    )
    .increment(1);
}

/// Record a dispatched batch
pub fn record_dispatch(mode: DispatchMode, measurements: usize) {
    let mode = match mode {
        DispatchMode::Routed => "routed",
        DispatchMode::Broadcast => "broadcast",
    };
    counter!("router_measurements_dispatched_total", "mode" => mode)
        .increment(measurements as u64);
}

/// Record a failed delivery to one adapter
pub fn record_delivery_failure(adapter: &str) {
    counter!(
        "router_delivery_failures_total",
        "adapter" => adapter.to_string()
    )
    .increment(1);
}

/// Route calculation aggregator
///
/// Aggregates calculation outcomes in memory for summaries.
#[derive(Debug, Clone, Default)]
pub struct CalculationAggregator {
    /// Calculations that published a table
    pub completed: u64,

    /// Calculations that failed
    pub failed: u64,

    /// Readiness timeouts across all calculations
    pub readiness_timeouts: u64,

    /// Calculation duration (ms)
    pub duration_stats: RunningStats,

    /// Routed keys per published table
    pub route_key_stats: RunningStats,
}

impl CalculationAggregator {
    /// Create an empty aggregator
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold in one calculation
    pub fn update(&mut self, success: bool, elapsed: Duration, shape: &TableShape, timeouts: u64) {
        if success {
            self.completed += 1;
            self.route_key_stats.push(shape.route_keys as f64);
        } else {
            self.failed += 1;
        }
        self.readiness_timeouts += timeouts;
        self.duration_stats.push(elapsed.as_secs_f64() * 1000.0);
    }

    /// Build a summary
    pub fn summary(&self) -> CalculationSummary {
        let total = self.completed + self.failed;
        CalculationSummary {
            completed: self.completed,
            failed: self.failed,
            failure_rate: if total > 0 {
                self.failed as f64 / total as f64 * 100.0
            } else {
                0.0
            },
            readiness_timeouts: self.readiness_timeouts,
            duration_ms: StatsSummary::from(&self.duration_stats),
            route_keys: StatsSummary::from(&self.route_key_stats),
        }
    }

    /// Reset all statistics
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Calculation summary
#[derive(Debug, Clone, Default)]
pub struct CalculationSummary {
    pub completed: u64,
    pub failed: u64,
    pub failure_rate: f64,
    pub readiness_timeouts: u64,
    pub duration_ms: StatsSummary,
    pub route_keys: StatsSummary,
}

impl std::fmt::Display for CalculationSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Route Calculation Summary ===")?;
        writeln!(
            f,
            "Calculations: {} completed, {} failed ({:.2}%)",
            self.completed, self.failed, self.failure_rate
        )?;
        writeln!(f, "Readiness timeouts: {}", self.readiness_timeouts)?;
        writeln!(f, "Duration (ms): {}", self.duration_ms)?;
        writeln!(f, "Routed keys: {}", self.route_keys)?;
        Ok(())
    }
}

/// Statistics summary
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// Online statistics (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    /// Add a sample
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            let delta2 = value - self.mean;
            self.m2 += delta * delta2;
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// Sample variance
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}
