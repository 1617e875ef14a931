//! RelayProcessor - re-emits the mean of each received batch
//!
//! Every batch that reaches the processor is reduced to its mean value and
//! published once per active output key, stamped with the newest input
//! timestamp. Publishing goes back through the engine, so outputs are routed
//! like any producer's.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use contracts::{
    Adapter, BatchWriter, ContractError, InputAdapter, KeySet, Measurement, MeasurementCallback,
    OutputAdapter, Processor, ProcessorConfig,
};
use tracing::trace;

use crate::handle::AdapterHandle;
use crate::metrics::WorkerMetrics;
use crate::state::AdapterState;

/// Worker-side half of a [`RelayProcessor`]
struct RelayWriter {
    state: Arc<AdapterState>,
    publish: MeasurementCallback,
    emitted: Arc<AtomicU64>,
}

impl BatchWriter for RelayWriter {
    fn name(&self) -> &str {
        self.state.name()
    }

    async fn write(&mut self, batch: &[Measurement]) -> Result<(), ContractError> {
        let Some((mean, timestamp)) = reduce(batch) else {
            return Ok(());
        };

        let outputs = self.state.active_outputs();
        if outputs.is_empty() {
            return Ok(());
        }

        let derived: Vec<Measurement> = outputs
            .into_iter()
            .map(|key| Measurement::new(key, mean, timestamp))
            .collect();

        trace!(processor = %self.state.name(), outputs = derived.len(), mean, "Relaying");
        self.emitted.fetch_add(derived.len() as u64, Ordering::Relaxed);
        (self.publish)(derived);
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), ContractError> {
        Ok(())
    }

    async fn close(&mut self) -> Result<(), ContractError> {
        Ok(())
    }
}

/// Mean value and newest timestamp, `None` for an empty batch
fn reduce(batch: &[Measurement]) -> Option<(f64, f64)> {
    if batch.is_empty() {
        return None;
    }
    let sum: f64 = batch.iter().map(|m| m.value).sum();
    let newest = batch
        .iter()
        .map(|m| m.timestamp)
        .fold(f64::NEG_INFINITY, f64::max);
    Some((sum / batch.len() as f64, newest))
}

/// Processor adapter relaying batch means on its output keys
pub struct RelayProcessor {
    state: Arc<AdapterState>,
    handle: AdapterHandle,
    emitted: Arc<AtomicU64>,
}

impl RelayProcessor {
    /// Build the processor and spawn its worker, publishing through `publish`.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn from_config(config: &ProcessorConfig, publish: MeasurementCallback) -> Self {
        let state = Arc::new(
            AdapterState::new(&config.name, config.auto_start)
                .with_inputs(config.inputs.clone())
                .with_outputs(config.outputs.clone())
                .with_readiness_timeout(config.readiness_timeout_ms.map(Duration::from_millis))
                .with_startup_delay(Duration::from_millis(config.startup_delay_ms)),
        );
        let emitted = Arc::new(AtomicU64::new(0));

        let writer = RelayWriter {
            state: Arc::clone(&state),
            publish,
            emitted: Arc::clone(&emitted),
        };

        Self {
            state,
            handle: AdapterHandle::spawn(writer, config.queue_capacity),
            emitted,
        }
    }

    pub fn state(&self) -> &Arc<AdapterState> {
        &self.state
    }

    pub fn metrics(&self) -> &Arc<WorkerMetrics> {
        self.handle.metrics()
    }

    /// Derived measurements published so far
    pub fn emitted(&self) -> u64 {
        self.emitted.load(Ordering::Relaxed)
    }

    /// Drain the queue and stop the worker
    pub async fn shutdown(&self) {
        self.handle.shutdown().await;
    }
}

impl Adapter for RelayProcessor {
    fn name(&self) -> &str {
        self.state.name()
    }

    fn auto_start(&self) -> bool {
        self.state.auto_start()
    }

    fn is_enabled(&self) -> bool {
        self.state.is_enabled()
    }

    fn set_enabled(&self, enabled: bool) {
        self.state.set_enabled(enabled);
    }

    fn readiness_timeout(&self) -> Option<Duration> {
        self.state.readiness_timeout()
    }

    fn wait_for_ready(&self, timeout: Duration) -> bool {
        self.state.wait_for_ready(timeout)
    }
}

impl InputAdapter for RelayProcessor {
    fn input_keys(&self) -> Option<KeySet> {
        self.state.input_keys()
    }

    fn requested_input_keys(&self) -> Option<KeySet> {
        self.state.requested_input_keys()
    }

    fn set_requested_input_keys(&self, keys: Option<KeySet>) {
        self.state.set_requested_input_keys(keys);
    }

    fn accept(&self, batch: &[Measurement]) -> Result<(), ContractError> {
        self.handle.try_send(batch.to_vec())?;
        Ok(())
    }
}

impl OutputAdapter for RelayProcessor {
    fn output_keys(&self) -> Option<KeySet> {
        self.state.output_keys()
    }

    fn requested_output_keys(&self) -> Option<KeySet> {
        self.state.requested_output_keys()
    }

    fn set_requested_output_keys(&self, keys: Option<KeySet>) {
        self.state.set_requested_output_keys(keys);
    }
}

impl Processor for RelayProcessor {}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::MeasurementKey;
    use parking_lot::Mutex;

    fn config(auto_start: bool) -> ProcessorConfig {
        ProcessorConfig {
            name: "avg".to_string(),
            inputs: Some(vec!["PPA:1".parse().unwrap(), "PPA:2".parse().unwrap()]),
            outputs: vec!["CALC:1".parse().unwrap(), "CALC:2".parse().unwrap()],
            auto_start,
            queue_capacity: 8,
            readiness_timeout_ms: None,
            startup_delay_ms: 0,
        }
    }

    fn collector() -> (MeasurementCallback, Arc<Mutex<Vec<Measurement>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let callback: MeasurementCallback = Arc::new(move |batch: Vec<Measurement>| {
            sink.lock().extend(batch);
        });
        (callback, seen)
    }

    fn input() -> Vec<Measurement> {
        vec![
            Measurement::new(MeasurementKey::new("PPA", 1), 1.0, 10.0),
            Measurement::new(MeasurementKey::new("PPA", 2), 3.0, 12.0),
        ]
    }

    #[test]
    fn test_reduce() {
        assert_eq!(reduce(&[]), None);
        assert_eq!(reduce(&input()), Some((2.0, 12.0)));
    }

    #[tokio::test]
    async fn test_relays_mean_on_every_output() {
        let (callback, seen) = collector();
        let processor = RelayProcessor::from_config(&config(true), callback);

        processor.accept(&input()).unwrap();
        processor.shutdown().await;

        let seen = seen.lock();
        let keys: Vec<String> = seen.iter().map(|m| m.key.to_string()).collect();
        assert_eq!(keys, vec!["CALC:1", "CALC:2"]);
        assert!(seen.iter().all(|m| m.value == 2.0 && m.timestamp == 12.0));
        assert_eq!(processor.emitted(), 2);
    }

    #[tokio::test]
    async fn test_demand_driven_relays_only_requested() {
        let (callback, seen) = collector();
        let processor = RelayProcessor::from_config(&config(false), callback);
        processor.set_enabled(true);
        processor.set_requested_output_keys(Some(
            [MeasurementKey::new("CALC", 2)].into_iter().collect(),
        ));

        processor.accept(&input()).unwrap();
        processor.shutdown().await;

        let seen = seen.lock();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].key, MeasurementKey::new("CALC", 2));
    }
}
