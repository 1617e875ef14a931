//! # Routing
//!
//! Measurement routing core.
//!
//! Responsibilities:
//! - Keep an immutable key → destination table, rebuilt on topology change
//! - Debounce recalculation: one running, at most one queued
//! - Enable/disable demand-driven adapters from global supply and demand
//! - Fan out batches to processors and sinks, isolating faulty adapters
//!
//! ## Usage
//!
//! ```ignore
//! use routing::RoutingEngine;
//!
//! let engine = RoutingEngine::new(blueprint.engine.clone());
//! engine.add_producer(pmu)?;
//! engine.add_sink(archive)?;
//!
//! // Producers publish through the engine
//! let publish = engine.publisher();
//! publish(batch);
//!
//! engine.shutdown(Duration::from_secs(5));
//! ```

mod calculator;
mod demand;
mod dispatcher;
mod engine;
mod error;
mod registry;
mod stats;
mod table;

#[cfg(test)]
mod test_support;

pub use calculator::{calculate_routes, BlockingSpawner, Calculation, Job, Spawner, TriggerOutcome};
pub use demand::{propagate_demand, DemandReport};
pub use dispatcher::{dispatch_broadcast, dispatch_routed};
pub use engine::RoutingEngine;
pub use error::{Result, RoutingError};
pub use registry::{AdapterRegistry, Registries};
pub use stats::{DispatchSummary, EngineStats, StatsSnapshot};
pub use table::{
    KeyRoute, RouteTable, RouteTableSummary, Routes, RoutesBuilder, RoutesSummary, TableCell,
};
