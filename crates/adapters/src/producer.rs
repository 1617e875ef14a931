//! Simulated producer
//!
//! Emits a synthetic waveform per key at a fixed rate, for testing without
//! real measurement sources.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use contracts::{
    Adapter, KeySet, Measurement, MeasurementCallback, MeasurementKey, OutputAdapter, Producer,
    ProducerConfig,
};
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use crate::state::AdapterState;

/// Fastest emission period
const MIN_INTERVAL: Duration = Duration::from_micros(100);

/// Producer emitting `sin` waveforms on its active keys
pub struct SimulatedProducer {
    state: Arc<AdapterState>,
    frequency_hz: f64,
    running: Arc<AtomicBool>,
    emitted: Arc<AtomicU64>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl SimulatedProducer {
    /// Create from configuration. Nothing is emitted until [`start`](Self::start).
    pub fn new(config: &ProducerConfig) -> Self {
        let state = AdapterState::new(&config.name, config.auto_start)
            .with_outputs(config.outputs.clone())
            .with_readiness_timeout(config.readiness_timeout_ms.map(Duration::from_millis))
            .with_startup_delay(Duration::from_millis(config.startup_delay_ms));

        Self {
            state: Arc::new(state),
            frequency_hz: config.frequency_hz,
            running: Arc::new(AtomicBool::new(false)),
            emitted: Arc::new(AtomicU64::new(0)),
            task: Mutex::new(None),
        }
    }

    pub fn state(&self) -> &Arc<AdapterState> {
        &self.state
    }

    /// Measurements emitted so far
    pub fn emitted(&self) -> u64 {
        self.emitted.load(Ordering::Relaxed)
    }

    /// Spawn the emission task, publishing through `publish`.
    ///
    /// Must be called from within a Tokio runtime. Calling it again while
    /// running does nothing.
    pub fn start(&self, publish: MeasurementCallback) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }

        let state = Arc::clone(&self.state);
        let running = Arc::clone(&self.running);
        let emitted = Arc::clone(&self.emitted);
        let interval = Duration::try_from_secs_f64(1.0 / self.frequency_hz)
            .unwrap_or(Duration::from_secs(1))
            .max(MIN_INTERVAL);

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            let mut changes = state.subscribe();
            let start_time = Instant::now();

            debug!(
                producer = %state.name(),
                interval_ms = interval.as_millis() as u64,
                "Simulated producer started"
            );

            while running.load(Ordering::Relaxed) {
                let active = state.active_outputs();
                if active.is_empty() {
                    // Idle until enabled or resubscribed
                    if changes.changed().await.is_err() {
                        break;
                    }
                    ticker.reset();
                    continue;
                }

                ticker.tick().await;
                let timestamp = start_time.elapsed().as_secs_f64();
                let batch = sample(&active, timestamp);
                trace!(producer = %state.name(), measurements = batch.len(), "Emitting batch");
                emitted.fetch_add(batch.len() as u64, Ordering::Relaxed);
                publish(batch);
            }

            debug!(producer = %state.name(), "Simulated producer stopped");
        });

        *self.task.lock() = Some(task);
    }

    /// Stop the emission task and wait for it to exit
    pub async fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        let task = self.task.lock().take();
        if let Some(task) = task {
            // An idle task is parked on the change signal
            task.abort();
            let _ = task.await;
        }
    }
}

/// One reading per key: a 1 Hz sine offset by the key id
fn sample(keys: &KeySet, timestamp: f64) -> Vec<Measurement> {
    keys.iter()
        .map(|key: &MeasurementKey| {
            let phase = key.id() as f64;
            let value = (std::f64::consts::TAU * timestamp + phase).sin();
            Measurement::new(key.clone(), value, timestamp)
        })
        .collect()
}

impl Adapter for SimulatedProducer {
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

impl OutputAdapter for SimulatedProducer {
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

impl Producer for SimulatedProducer {}
