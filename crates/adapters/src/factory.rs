//! AdapterFactory - builds a running topology from a RouterBlueprint
//!
//! Adapters are created and registered with the engine in declaration order.
//! If any step fails, everything registered so far is removed again and its
//! workers are shut down.

use std::sync::Arc;

use contracts::{
    AdapterRole, InputAdapter, KeySet, MeasurementCallback, OutputAdapter, Producer,
    ProducerConfig, Processor, RouterBlueprint, Sink,
};
use routing::RoutingEngine;
use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::error::{AdapterError, Result};
use crate::metrics::MetricsSnapshot;
use crate::processor::RelayProcessor;
use crate::producer::SimulatedProducer;
use crate::sinks::{CountsSnapshot, QueuedSink};

/// Adapter Factory
pub struct AdapterFactory;

impl AdapterFactory {
    /// Create every adapter in `blueprint` and register it with `engine`.
    ///
    /// Must be called from within a Tokio runtime. On failure the engine is
    /// left with none of the blueprint's adapters.
    #[instrument(
        name = "adapter_factory_build",
        skip(blueprint, engine),
        fields(
            producers = blueprint.producers.len(),
            processors = blueprint.processors.len(),
            sinks = blueprint.sinks.len()
        )
    )]
    pub async fn build(blueprint: &RouterBlueprint, engine: &RoutingEngine) -> Result<Topology> {
        let mut topology = Topology::default();

        if let Err(e) = Self::populate(blueprint, engine, &mut topology) {
            warn!(error = %e, "build failed, rolling back registered adapters");
            topology.rollback(engine).await;
            return Err(e);
        }

        info!(adapters = topology.len(), "topology built");
        Ok(topology)
    }

    fn populate(
        blueprint: &RouterBlueprint,
        engine: &RoutingEngine,
        topology: &mut Topology,
    ) -> Result<()> {
        for config in &blueprint.producers {
            check_producer(config)?;
            let producer = Arc::new(SimulatedProducer::new(config));
            topology.producers.push(Arc::clone(&producer));
            engine.add_producer(producer as Arc<dyn Producer>)?;
            topology.registered.push(config.name.clone());
        }

        for config in &blueprint.processors {
            let processor = Arc::new(RelayProcessor::from_config(config, engine.publisher()));
            // Registered or not, the worker is running and must be stopped on rollback
            topology.processors.push(Arc::clone(&processor));
            engine.add_processor(processor as Arc<dyn Processor>)?;
            topology.registered.push(config.name.clone());
        }

        for config in &blueprint.sinks {
            let sink = Arc::new(QueuedSink::from_config(config));
            topology.sinks.push(Arc::clone(&sink));
            engine.add_sink(sink as Arc<dyn Sink>)?;
            topology.registered.push(config.name.clone());
        }

        Ok(())
    }
}

fn check_producer(config: &ProducerConfig) -> Result<()> {
    if !(config.frequency_hz.is_finite() && config.frequency_hz > 0.0) {
        return Err(AdapterError::build(
            &config.name,
            format!("frequency_hz must be > 0, got {}", config.frequency_hz),
        ));
    }
    Ok(())
}

/// Adapters built from one blueprint
#[derive(Default)]
pub struct Topology {
    producers: Vec<Arc<SimulatedProducer>>,
    processors: Vec<Arc<RelayProcessor>>,
    sinks: Vec<Arc<QueuedSink>>,
    /// Names accepted by the engine, removed again on rollback
    registered: Vec<String>,
}

impl Topology {
    pub fn producers(&self) -> &[Arc<SimulatedProducer>] {
        &self.producers
    }

    pub fn processors(&self) -> &[Arc<RelayProcessor>] {
        &self.processors
    }

    pub fn sinks(&self) -> &[Arc<QueuedSink>] {
        &self.sinks
    }

    pub fn sink(&self, name: &str) -> Option<&Arc<QueuedSink>> {
        self.sinks.iter().find(|s| s.state().name() == name)
    }

    pub fn len(&self) -> usize {
        self.producers.len() + self.processors.len() + self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Start every simulated producer, publishing through `publish`.
    ///
    /// Demand-driven producers start idle and emit once enabled.
    pub fn start_producers(&self, publish: MeasurementCallback) {
        for producer in &self.producers {
            producer.start(Arc::clone(&publish));
        }
        info!(producers = self.producers.len(), "producers started");
    }

    /// Stop producers first, then drain processors, then sinks
    #[instrument(name = "topology_shutdown", skip(self), fields(adapters = self.len()))]
    pub async fn shutdown(&self) {
        for producer in &self.producers {
            producer.stop().await;
        }
        for processor in &self.processors {
            processor.shutdown().await;
        }
        for sink in &self.sinks {
            sink.shutdown().await;
        }
        info!("topology shut down");
    }

    async fn rollback(&self, engine: &RoutingEngine) {
        for name in &self.registered {
            engine.remove_adapter(name);
        }
        self.shutdown().await;
    }

    /// Current per-adapter state, in declaration order
    pub fn adapter_reports(&self) -> Vec<AdapterReport> {
        let producers = self.producers.iter().map(|p| AdapterReport {
            name: p.state().name().to_string(),
            role: AdapterRole::Producer,
            enabled: p.state().is_enabled(),
            auto_start: p.state().auto_start(),
            requested_inputs: None,
            requested_outputs: key_names(p.requested_output_keys()),
            emitted: Some(p.emitted()),
            worker: None,
            counts: None,
        });

        let processors = self.processors.iter().map(|p| AdapterReport {
            name: p.state().name().to_string(),
            role: AdapterRole::Processor,
            enabled: p.state().is_enabled(),
            auto_start: p.state().auto_start(),
            requested_inputs: key_names(p.requested_input_keys()),
            requested_outputs: key_names(p.requested_output_keys()),
            emitted: Some(p.emitted()),
            worker: Some(p.metrics().snapshot()),
            counts: None,
        });

        let sinks = self.sinks.iter().map(|s| AdapterReport {
            name: s.state().name().to_string(),
            role: AdapterRole::Sink,
            enabled: s.state().is_enabled(),
            auto_start: s.state().auto_start(),
            requested_inputs: key_names(s.requested_input_keys()),
            requested_outputs: None,
            emitted: None,
            worker: Some(s.metrics().snapshot()),
            counts: s.counts().map(|c| c.snapshot()),
        });

        producers.chain(processors).chain(sinks).collect()
    }
}

fn key_names(keys: Option<KeySet>) -> Option<Vec<String>> {
    keys.map(|keys| keys.iter().map(|k| k.to_string()).collect())
}

/// Serializable adapter state for the CLI
#[derive(Debug, Clone, Serialize)]
pub struct AdapterReport {
    pub name: String,
    pub role: AdapterRole,
    pub enabled: bool,
    pub auto_start: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requested_inputs: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requested_outputs: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emitted: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub worker: Option<MetricsSnapshot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub counts: Option<CountsSnapshot>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{EngineSettings, ProcessorConfig, SinkConfig, SinkKind};
    use routing::RoutingError;
    use std::time::Duration;

    fn producer(name: &str, outputs: &[&str], auto_start: bool) -> ProducerConfig {
        ProducerConfig {
            name: name.to_string(),
            outputs: outputs.iter().map(|s| s.parse().unwrap()).collect(),
            frequency_hz: 100.0,
            auto_start,
            readiness_timeout_ms: None,
            startup_delay_ms: 0,
        }
    }

    fn sink(name: &str, inputs: &[&str], auto_start: bool) -> SinkConfig {
        SinkConfig {
            name: name.to_string(),
            kind: SinkKind::Counting,
            inputs: Some(inputs.iter().map(|s| s.parse().unwrap()).collect()),
            auto_start,
            queue_capacity: 64,
            readiness_timeout_ms: None,
            startup_delay_ms: 0,
        }
    }

    fn blueprint() -> RouterBlueprint {
        RouterBlueprint {
            producers: vec![producer("pmu", &["PPA:1", "PPA:2"], false)],
            processors: vec![ProcessorConfig {
                name: "avg".to_string(),
                inputs: Some(vec!["PPA:1".parse().unwrap()]),
                outputs: vec!["CALC:1".parse().unwrap()],
                auto_start: true,
                queue_capacity: 64,
                readiness_timeout_ms: None,
                startup_delay_ms: 0,
            }],
            sinks: vec![sink("archive", &["PPA:2", "CALC:1"], false)],
            ..Default::default()
        }
    }

    async fn settle(engine: &RoutingEngine) {
        let idle = tokio::task::block_in_place(|| engine.wait_for_idle(Duration::from_secs(5)));
        assert!(idle);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_build_registers_everything() {
        let engine = RoutingEngine::new(EngineSettings::default());
        let topology = AdapterFactory::build(&blueprint(), &engine).await.unwrap();
        settle(&engine).await;

        assert_eq!(topology.len(), 3);
        assert_eq!(engine.registries().adapter_count(), 3);

        let table = engine.route_table();
        assert_eq!(table.processors_for(&"PPA:1".parse().unwrap()), vec!["avg"]);
        assert_eq!(table.sinks_for(&"CALC:1".parse().unwrap()), vec!["archive"]);

        let reports = topology.adapter_reports();
        let names: Vec<&str> = reports.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["pmu", "avg", "archive"]);
        // Sink demand enables the on-demand producer
        assert!(reports[0].enabled);
        assert_eq!(
            reports[0].requested_outputs,
            Some(vec!["PPA:1".to_string(), "PPA:2".to_string()])
        );

        topology.shutdown().await;
        engine.shutdown(Duration::from_secs(1));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_end_to_end_delivery() {
        let engine = RoutingEngine::new(EngineSettings::default());
        let topology = AdapterFactory::build(&blueprint(), &engine).await.unwrap();
        settle(&engine).await;

        topology.start_producers(engine.publisher());
        tokio::time::sleep(Duration::from_millis(100)).await;
        topology.shutdown().await;

        let counts = topology.sink("archive").and_then(|s| s.counts()).unwrap();
        assert!(counts.get(&"PPA:2".parse().unwrap()) > 0);
        assert_eq!(counts.get(&"PPA:1".parse().unwrap()), 0);
        // PPA:1 reaches the sink only as the relayed CALC:1
        assert!(counts.get(&"CALC:1".parse().unwrap()) > 0);

        engine.shutdown(Duration::from_secs(1));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_duplicate_name_rolls_back() {
        let engine = RoutingEngine::new(EngineSettings::default());
        let mut bp = blueprint();
        bp.sinks.push(sink("pmu", &["PPA:1"], true));

        let err = AdapterFactory::build(&bp, &engine).await.err().unwrap();
        assert!(matches!(
            err,
            AdapterError::Routing(RoutingError::DuplicateAdapter { .. })
        ));
        assert_eq!(engine.registries().adapter_count(), 0);

        engine.shutdown(Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_invalid_frequency_is_rejected() {
        let engine = RoutingEngine::new(EngineSettings::default());
        let mut bp = blueprint();
        bp.producers[0].frequency_hz = 0.0;

        let err = AdapterFactory::build(&bp, &engine).await.err().unwrap();
        assert!(matches!(err, AdapterError::Build { .. }));
        assert_eq!(engine.registries().adapter_count(), 0);

        engine.shutdown(Duration::from_secs(1));
    }
}
