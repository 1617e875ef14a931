//! Run statistics.

use std::time::Duration;

use adapters::AdapterReport;
use observability::CalculationSummary;
use routing::StatsSnapshot;
use serde::Serialize;

/// Statistics from a pipeline run
#[derive(Debug, Clone, Serialize)]
pub struct PipelineStats {
    /// Wall time producers were running
    pub duration: Duration,

    /// Engine counters
    pub engine: StatsSnapshot,

    /// Route calculation timings
    #[serde(skip)]
    pub calculations: CalculationSummary,

    /// Final per-adapter state
    pub adapters: Vec<AdapterReport>,
}

impl PipelineStats {
    /// Dispatched measurements per second
    pub fn throughput(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.engine.measurements as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        println!("\n=== Run Statistics ===\n");
        println!("Duration: {:.2}s", self.duration.as_secs_f64());
        println!("Throughput: {:.1} measurements/s", self.throughput());
        println!("{}", self.engine);
        println!("{}", self.calculations);

        println!("Adapters:");
        for adapter in &self.adapters {
            let state = if adapter.enabled { "enabled" } else { "disabled" };
            print!("  - {} ({}, {})", adapter.name, adapter.role, state);
            if let Some(emitted) = adapter.emitted {
                print!(" emitted={}", emitted);
            }
            if let Some(worker) = &adapter.worker {
                print!(
                    " batches={} failed={} dropped={} peak_queue={}",
                    worker.batches, worker.failed, worker.dropped, worker.peak_queue_len
                );
            }
            println!();

            if let Some(counts) = &adapter.counts {
                for (key, count) in &counts.per_key {
                    println!("      {}: {}", key, count);
                }
            }
        }
        println!();
    }
}
