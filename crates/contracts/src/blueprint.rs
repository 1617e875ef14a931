//! RouterBlueprint - Config Loader output
//!
//! Describes an adapter topology: engine settings, producers, processors and sinks.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::{KeySet, MeasurementKey};

/// Config version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// Complete topology blueprint
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RouterBlueprint {
    /// Config version
    #[serde(default)]
    pub version: ConfigVersion,

    /// Routing engine settings
    #[serde(default)]
    pub engine: EngineSettings,

    /// Measurement producers
    #[serde(default)]
    pub producers: Vec<ProducerConfig>,

    /// Measurement processors
    #[serde(default)]
    pub processors: Vec<ProcessorConfig>,

    /// Measurement sinks
    #[serde(default)]
    pub sinks: Vec<SinkConfig>,
}

impl RouterBlueprint {
    /// Names of all adapters, in declaration order
    pub fn adapter_names(&self) -> impl Iterator<Item = &str> {
        self.producers
            .iter()
            .map(|p| p.name.as_str())
            .chain(self.processors.iter().map(|p| p.name.as_str()))
            .chain(self.sinks.iter().map(|s| s.name.as_str()))
    }

    /// Union of every declared output key
    pub fn provided_keys(&self) -> KeySet {
        self.producers
            .iter()
            .flat_map(|p| p.outputs.iter())
            .chain(self.processors.iter().flat_map(|p| p.outputs.iter()))
            .cloned()
            .collect()
    }

    /// Union of every declared input key
    pub fn demanded_keys(&self) -> KeySet {
        self.processors
            .iter()
            .filter_map(|p| p.inputs.as_ref())
            .chain(self.sinks.iter().filter_map(|s| s.inputs.as_ref()))
            .flatten()
            .cloned()
            .collect()
    }
}

/// How new measurements reach processors and sinks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchMode {
    /// Per-key lookup through the route table
    #[default]
    Routed,
    /// Every batch to every enabled processor and sink, unfiltered
    Broadcast,
}

/// Routing engine settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Default readiness timeout for adapters that do not set their own (ms)
    #[serde(default = "default_readiness_timeout_ms")]
    pub readiness_timeout_ms: u64,

    /// Default dispatch mode
    #[serde(default)]
    pub dispatch_mode: DispatchMode,

    /// Upper bound on waiting for an in-flight calculation at shutdown (ms)
    #[serde(default = "default_shutdown_timeout_ms")]
    pub shutdown_timeout_ms: u64,
}

impl EngineSettings {
    /// Default readiness timeout as a Duration
    pub fn readiness_timeout(&self) -> Duration {
        Duration::from_millis(self.readiness_timeout_ms)
    }

    /// Shutdown timeout as a Duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            readiness_timeout_ms: default_readiness_timeout_ms(),
            dispatch_mode: DispatchMode::default(),
            shutdown_timeout_ms: default_shutdown_timeout_ms(),
        }
    }
}

fn default_readiness_timeout_ms() -> u64 {
    1000
}

fn default_shutdown_timeout_ms() -> u64 {
    5000
}

fn default_auto_start() -> bool {
    true
}

fn default_frequency_hz() -> f64 {
    10.0
}

fn default_queue_capacity() -> usize {
    1024
}

/// Producer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProducerConfig {
    /// Unique adapter name
    pub name: String,

    /// Keys this producer can emit
    #[serde(default)]
    pub outputs: Vec<MeasurementKey>,

    /// Emission rate (Hz), must be > 0
    #[serde(default = "default_frequency_hz")]
    pub frequency_hz: f64,

    /// false = connect on demand
    #[serde(default = "default_auto_start")]
    pub auto_start: bool,

    /// Overrides `engine.readiness_timeout_ms`
    #[serde(default)]
    pub readiness_timeout_ms: Option<u64>,

    /// Simulated initialization time before the adapter reports ready (ms)
    #[serde(default)]
    pub startup_delay_ms: u64,
}

/// Processor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessorConfig {
    /// Unique adapter name
    pub name: String,

    /// Keys this processor consumes. Omitted = every measurement.
    #[serde(default)]
    pub inputs: Option<Vec<MeasurementKey>>,

    /// Keys this processor emits
    #[serde(default)]
    pub outputs: Vec<MeasurementKey>,

    /// false = connect on demand
    #[serde(default = "default_auto_start")]
    pub auto_start: bool,

    /// Worker queue capacity (batches), must be > 0
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Overrides `engine.readiness_timeout_ms`
    #[serde(default)]
    pub readiness_timeout_ms: Option<u64>,

    /// Simulated initialization time before the adapter reports ready (ms)
    #[serde(default)]
    pub startup_delay_ms: u64,
}

/// Sink backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkKind {
    /// Logs batch summaries via tracing
    Log,
    /// Counts measurements per key
    #[default]
    Counting,
}

/// Sink configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinkConfig {
    /// Unique adapter name
    pub name: String,

    /// Sink backend
    #[serde(default)]
    pub kind: SinkKind,

    /// Keys this sink consumes. Omitted = every measurement.
    #[serde(default)]
    pub inputs: Option<Vec<MeasurementKey>>,

    /// false = connect on demand
    #[serde(default = "default_auto_start")]
    pub auto_start: bool,

    /// Worker queue capacity (batches), must be > 0
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Overrides `engine.readiness_timeout_ms`
    #[serde(default)]
    pub readiness_timeout_ms: Option<u64>,

    /// Simulated initialization time before the adapter reports ready (ms)
    #[serde(default)]
    pub startup_delay_ms: u64,
}
