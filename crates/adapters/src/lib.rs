//! # Adapters
//!
//! Reference producers, processors and sinks for the routing engine.
//!
//! Every adapter embeds an [`AdapterState`] the engine drives (enabled flag,
//! requested keys, readiness). Adapters that consume measurements put a
//! bounded queue and a Tokio worker ([`AdapterHandle`]) behind `accept`, so the
//! dispatching thread never waits on adapter work.
//!
//! ## Usage
//!
//! ```ignore
//! use adapters::AdapterFactory;
//! use routing::RoutingEngine;
//!
//! let engine = RoutingEngine::new(blueprint.engine.clone());
//! let topology = AdapterFactory::build(&blueprint, &engine).await?;
//! topology.start_producers(engine.publisher());
//!
//! // ...
//!
//! topology.shutdown().await;
//! engine.shutdown(blueprint.engine.shutdown_timeout());
//! ```

mod error;
mod factory;
mod handle;
mod metrics;
mod processor;
mod producer;
mod sinks;
mod state;

pub use error::{AdapterError, Result};
pub use factory::{AdapterFactory, AdapterReport, Topology};
pub use handle::AdapterHandle;
pub use metrics::{MetricsSnapshot, WorkerMetrics};
pub use processor::RelayProcessor;
pub use producer::SimulatedProducer;
pub use sinks::{CountingSink, CountsSnapshot, LogSink, QueuedSink, SinkCounts};
pub use state::AdapterState;
