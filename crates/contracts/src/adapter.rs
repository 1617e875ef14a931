//! Adapter capability traits - the only surface the routing engine sees
//!
//! Adapters come in three roles. Producers only emit, sinks only consume and
//! processors do both. The engine never inspects concrete types; each role is
//! expressed as a combination of the input and output capabilities below.
//!
//! All setters take `&self`: adapters are shared behind `Arc` between the
//! registry, the published route table and their own worker tasks, so state
//! the engine mutates lives behind interior mutability.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::{ContractError, KeySet, Measurement};

/// Callback through which producers and processors publish new measurements.
pub type MeasurementCallback = Arc<dyn Fn(Vec<Measurement>) + Send + Sync>;

/// Role of an adapter within the routing topology
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdapterRole {
    Producer,
    Processor,
    Sink,
}

impl AdapterRole {
    /// Label used in logs and metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Producer => "producer",
            Self::Processor => "processor",
            Self::Sink => "sink",
        }
    }
}

impl fmt::Display for AdapterRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Capabilities shared by every adapter
pub trait Adapter: Send + Sync {
    /// Unique adapter name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Always-on adapter, excluded from demand-driven enable/disable.
    fn auto_start(&self) -> bool;

    /// Whether the adapter currently takes part in data flow
    fn is_enabled(&self) -> bool;

    /// Start or stop the adapter
    fn set_enabled(&self, enabled: bool);

    /// How long route calculation waits for this adapter to become ready.
    ///
    /// `None` defers to the engine-wide default.
    fn readiness_timeout(&self) -> Option<Duration> {
        None
    }

    /// Block until the adapter is initialized or `timeout` elapses.
    ///
    /// Returns false on timeout; the engine then treats the adapter as a
    /// broadcast destination for the current calculation.
    fn wait_for_ready(&self, timeout: Duration) -> bool;
}

/// Adapter that consumes measurements
pub trait InputAdapter: Adapter {
    /// Keys the adapter wants. `None` means every measurement.
    fn input_keys(&self) -> Option<KeySet>;

    /// Subset of the input keys currently available somewhere in the system
    fn requested_input_keys(&self) -> Option<KeySet>;

    /// Update the requested input keys. Adapters may resubscribe upstream on change.
    fn set_requested_input_keys(&self, keys: Option<KeySet>);

    /// Enqueue a batch for asynchronous processing.
    ///
    /// Must not block the caller for any meaningful time.
    ///
    /// # Errors
    /// Returns a delivery error when the batch could not be enqueued
    fn accept(&self, batch: &[Measurement]) -> Result<(), ContractError>;
}

/// Adapter that emits measurements
pub trait OutputAdapter: Adapter {
    /// Keys the adapter can produce. `None` or empty means nothing declared.
    fn output_keys(&self) -> Option<KeySet>;

    /// Subset of the output keys currently demanded somewhere in the system
    fn requested_output_keys(&self) -> Option<KeySet>;

    /// Update the requested output keys. Adapters may resubscribe upstream on change.
    fn set_requested_output_keys(&self, keys: Option<KeySet>);
}

/// Generates measurements, requires no input
pub trait Producer: OutputAdapter {}

/// Consumes measurements and may re-emit new ones
pub trait Processor: InputAdapter + OutputAdapter {}

/// Consumes measurements only
pub trait Sink: InputAdapter {}
