//! AdapterState - the engine-facing half every adapter shares
//!
//! Holds declared keys, the enabled flag, requested keys and readiness.
//! Concrete adapters embed an `Arc<AdapterState>` and forward the capability
//! trait methods to it, so their worker tasks can read the same state.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use contracts::{KeySet, MeasurementKey};
use parking_lot::{Condvar, Mutex, RwLock};
use tokio::sync::watch;
use tracing::debug;

/// Shared adapter state
#[derive(Debug)]
pub struct AdapterState {
    name: String,
    auto_start: bool,
    enabled: AtomicBool,
    readiness_timeout: Option<Duration>,
    input_keys: RwLock<Option<KeySet>>,
    output_keys: RwLock<Option<KeySet>>,
    requested_inputs: RwLock<Option<KeySet>>,
    requested_outputs: RwLock<Option<KeySet>>,
    ready_at: Mutex<Instant>,
    ready_signal: Condvar,
    /// Bumped on every enable or resubscribe, for worker tasks to react to
    changes: watch::Sender<u64>,
}

impl AdapterState {
    /// New state. Auto-start adapters begin enabled, demand-driven ones disabled.
    pub fn new(name: impl Into<String>, auto_start: bool) -> Self {
        let (changes, _) = watch::channel(0);
        Self {
            name: name.into(),
            auto_start,
            enabled: AtomicBool::new(auto_start),
            readiness_timeout: None,
            input_keys: RwLock::new(None),
            output_keys: RwLock::new(None),
            requested_inputs: RwLock::new(None),
            requested_outputs: RwLock::new(None),
            ready_at: Mutex::new(Instant::now()),
            ready_signal: Condvar::new(),
            changes,
        }
    }

    /// Declared input keys. `None` receives every measurement.
    pub fn with_inputs(self, keys: Option<Vec<MeasurementKey>>) -> Self {
        *self.input_keys.write() = keys.map(|k| k.into_iter().collect());
        self
    }

    /// Declared output keys
    pub fn with_outputs(self, keys: Vec<MeasurementKey>) -> Self {
        *self.output_keys.write() = Some(keys.into_iter().collect());
        self
    }

    pub fn with_readiness_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.readiness_timeout = timeout;
        self
    }

    /// Report not ready until `delay` has elapsed
    pub fn with_startup_delay(self, delay: Duration) -> Self {
        *self.ready_at.lock() = Instant::now() + delay;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn auto_start(&self) -> bool {
        self.auto_start
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    pub fn set_enabled(&self, enabled: bool) {
        if self.enabled.swap(enabled, Ordering::SeqCst) != enabled {
            debug!(adapter = %self.name, enabled, "Adapter state changed");
            self.notify();
        }
    }

    pub fn readiness_timeout(&self) -> Option<Duration> {
        self.readiness_timeout
    }

    /// Finish initialization now
    pub fn mark_ready(&self) {
        *self.ready_at.lock() = Instant::now();
        self.ready_signal.notify_all();
    }

    pub fn is_ready(&self) -> bool {
        Instant::now() >= *self.ready_at.lock()
    }

    /// Block until ready or `timeout` elapses
    pub fn wait_for_ready(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut ready_at = self.ready_at.lock();
        loop {
            let now = Instant::now();
            if now >= *ready_at {
                return true;
            }
            if now >= deadline {
                return false;
            }
            let wake = (*ready_at).min(deadline);
            self.ready_signal.wait_until(&mut ready_at, wake);
        }
    }

    pub fn input_keys(&self) -> Option<KeySet> {
        self.input_keys.read().clone()
    }

    pub fn output_keys(&self) -> Option<KeySet> {
        self.output_keys.read().clone()
    }

    pub fn requested_input_keys(&self) -> Option<KeySet> {
        self.requested_inputs.read().clone()
    }

    pub fn set_requested_input_keys(&self, keys: Option<KeySet>) {
        debug!(adapter = %self.name, keys = ?keys, "Requested input keys updated");
        *self.requested_inputs.write() = keys;
        self.notify();
    }

    pub fn requested_output_keys(&self) -> Option<KeySet> {
        self.requested_outputs.read().clone()
    }

    pub fn set_requested_output_keys(&self, keys: Option<KeySet>) {
        debug!(adapter = %self.name, keys = ?keys, "Requested output keys updated");
        *self.requested_outputs.write() = keys;
        self.notify();
    }

    /// Output keys the adapter should currently emit.
    ///
    /// Auto-start adapters emit everything they declare; demand-driven ones only
    /// what is requested, and nothing while disabled.
    pub fn active_outputs(&self) -> KeySet {
        if !self.is_enabled() {
            return KeySet::new();
        }
        let keys = if self.auto_start {
            self.output_keys()
        } else {
            self.requested_output_keys()
        };
        keys.unwrap_or_default()
    }

    /// Receiver woken on every enable or resubscribe
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.changes.subscribe()
    }

    fn notify(&self) {
        self.changes.send_modify(|n| *n = n.wrapping_add(1));
    }
}
