//! Sink implementations
//!
//! Contains LogSink and CountingSink, plus the `QueuedSink` adapter that puts
//! either of them behind a worker queue.

mod counting;
mod log;

use std::sync::Arc;
use std::time::Duration;

use contracts::{
    Adapter, ContractError, InputAdapter, KeySet, Measurement, Sink, SinkConfig, SinkKind,
};

use crate::handle::AdapterHandle;
use crate::metrics::WorkerMetrics;
use crate::state::AdapterState;

pub use self::counting::{CountingSink, CountsSnapshot, SinkCounts};
pub use self::log::LogSink;

/// Sink adapter: engine-facing state in front of a queued [`contracts::BatchWriter`]
pub struct QueuedSink {
    state: Arc<AdapterState>,
    handle: AdapterHandle,
    kind: SinkKind,
    counts: Option<SinkCounts>,
}

impl QueuedSink {
    /// Build the configured backend and spawn its worker.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn from_config(config: &SinkConfig) -> Self {
        let state = AdapterState::new(&config.name, config.auto_start)
            .with_inputs(config.inputs.clone())
            .with_readiness_timeout(config.readiness_timeout_ms.map(Duration::from_millis))
            .with_startup_delay(Duration::from_millis(config.startup_delay_ms));

        let (handle, counts) = match config.kind {
            SinkKind::Log => (
                AdapterHandle::spawn(LogSink::new(&config.name), config.queue_capacity),
                None,
            ),
            SinkKind::Counting => {
                let counts = SinkCounts::new();
                let writer = CountingSink::new(&config.name, counts.clone());
                (
                    AdapterHandle::spawn(writer, config.queue_capacity),
                    Some(counts),
                )
            }
        };

        Self {
            state: Arc::new(state),
            handle,
            kind: config.kind,
            counts,
        }
    }

    pub fn state(&self) -> &Arc<AdapterState> {
        &self.state
    }

    pub fn kind(&self) -> SinkKind {
        self.kind
    }

    pub fn metrics(&self) -> &Arc<WorkerMetrics> {
        self.handle.metrics()
    }

    /// Per-key counts, for counting sinks
    pub fn counts(&self) -> Option<&SinkCounts> {
        self.counts.as_ref()
    }

    /// Drain the queue and close the backend
    pub async fn shutdown(&self) {
        self.handle.shutdown().await;
    }
}

impl Adapter for QueuedSink {
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

impl InputAdapter for QueuedSink {
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

impl Sink for QueuedSink {}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::MeasurementKey;

    fn config(name: &str, kind: SinkKind) -> SinkConfig {
        SinkConfig {
            name: name.to_string(),
            kind,
            inputs: Some(vec!["PPA:1".parse().unwrap()]),
            auto_start: true,
            queue_capacity: 16,
            readiness_timeout_ms: Some(50),
            startup_delay_ms: 0,
        }
    }

    #[tokio::test]
    async fn test_counting_sink_accepts_through_queue() {
        let sink = QueuedSink::from_config(&config("archive", SinkKind::Counting));
        let key = MeasurementKey::new("PPA", 1);

        sink.accept(&[Measurement::new(key.clone(), 1.0, 0.0)]).unwrap();
        sink.accept(&[Measurement::new(key.clone(), 2.0, 1.0)]).unwrap();
        sink.shutdown().await;

        let counts = sink.counts().unwrap();
        assert_eq!(counts.get(&key), 2);
        assert_eq!(sink.metrics().snapshot().batches, 2);
        assert_eq!(sink.input_keys().map(|k| k.len()), Some(1));
        assert_eq!(sink.readiness_timeout(), Some(Duration::from_millis(50)));
    }

    #[tokio::test]
    async fn test_accept_after_shutdown_is_a_delivery_error() {
        let sink = QueuedSink::from_config(&config("tap", SinkKind::Log));
        assert!(sink.counts().is_none());
        sink.shutdown().await;

        let err = sink
            .accept(&[Measurement::new(MeasurementKey::new("PPA", 1), 1.0, 0.0)])
            .unwrap_err();
        assert!(matches!(err, ContractError::AdapterClosed { .. }));
    }
}
