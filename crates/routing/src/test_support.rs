//! In-crate fakes for routing tests

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use contracts::{
    Adapter, ContractError, InputAdapter, KeySet, Measurement, MeasurementKey, OutputAdapter,
    Processor, Producer, Sink,
};
use parking_lot::{Condvar, Mutex, RwLock};

use crate::calculator::{Job, Spawner};

pub fn key(s: &str) -> MeasurementKey {
    s.parse().unwrap()
}

pub fn keys(items: &[&str]) -> KeySet {
    items.iter().map(|s| key(s)).collect()
}

pub fn batch(items: &[(&str, f64)]) -> Vec<Measurement> {
    items
        .iter()
        .enumerate()
        .map(|(i, (k, v))| Measurement::new(key(k), *v, i as f64))
        .collect()
}

/// Blocks `wait_for_ready` callers until opened
#[derive(Default)]
pub struct Gate {
    open: Mutex<bool>,
    entered: AtomicUsize,
    cond: Condvar,
}

impl Gate {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn open(&self) {
        *self.open.lock() = true;
        self.cond.notify_all();
    }

    /// Number of callers that reached the gate
    pub fn entered(&self) -> usize {
        self.entered.load(Ordering::SeqCst)
    }

    /// Spin until at least `n` callers reached the gate
    pub fn wait_entered(&self, n: usize) {
        while self.entered() < n {
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    fn pass(&self) {
        self.entered.fetch_add(1, Ordering::SeqCst);
        let mut open = self.open.lock();
        while !*open {
            self.cond.wait(&mut open);
        }
    }
}

/// Adapter implementing every role, recording what the engine does to it
pub struct FakeAdapter {
    name: String,
    auto_start: bool,
    enabled: AtomicBool,
    ready: AtomicBool,
    readiness_timeout: Option<Duration>,
    gate: Option<Arc<Gate>>,
    inputs: RwLock<Option<KeySet>>,
    outputs: RwLock<Option<KeySet>>,
    requested_in: RwLock<Option<KeySet>>,
    requested_out: RwLock<Option<KeySet>>,
    received: Mutex<Vec<Vec<Measurement>>>,
    fail: AtomicBool,
    panic: AtomicBool,
    panic_on_ready: AtomicBool,
    ready_checks: AtomicUsize,
    last_timeout: Mutex<Option<Duration>>,
    enable_calls: AtomicUsize,
    requested_in_updates: AtomicUsize,
    requested_out_updates: AtomicUsize,
}

impl FakeAdapter {
    pub fn builder(name: &str) -> FakeAdapterBuilder {
        FakeAdapterBuilder {
            name: name.to_string(),
            auto_start: true,
            enabled: None,
            ready: true,
            readiness_timeout: None,
            gate: None,
            inputs: None,
            outputs: None,
        }
    }

    pub fn received(&self) -> Vec<Vec<Measurement>> {
        self.received.lock().clone()
    }

    /// Keys of every measurement received, in arrival order
    pub fn received_keys(&self) -> Vec<String> {
        self.received
            .lock()
            .iter()
            .flatten()
            .map(|m| m.key.to_string())
            .collect()
    }

    pub fn batch_count(&self) -> usize {
        self.received.lock().len()
    }

    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    pub fn set_inputs(&self, keys: Option<KeySet>) {
        *self.inputs.write() = keys;
    }

    pub fn set_outputs(&self, keys: Option<KeySet>) {
        *self.outputs.write() = keys;
    }

    pub fn fail_deliveries(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn panic_on_accept(&self, panic: bool) {
        self.panic.store(panic, Ordering::SeqCst);
    }

    pub fn panic_on_ready(&self, panic: bool) {
        self.panic_on_ready.store(panic, Ordering::SeqCst);
    }

    pub fn ready_checks(&self) -> usize {
        self.ready_checks.load(Ordering::SeqCst)
    }

    pub fn last_timeout(&self) -> Option<Duration> {
        *self.last_timeout.lock()
    }

    pub fn enable_calls(&self) -> usize {
        self.enable_calls.load(Ordering::SeqCst)
    }

    pub fn requested_in_updates(&self) -> usize {
        self.requested_in_updates.load(Ordering::SeqCst)
    }

    pub fn requested_out_updates(&self) -> usize {
        self.requested_out_updates.load(Ordering::SeqCst)
    }
}

pub struct FakeAdapterBuilder {
    name: String,
    auto_start: bool,
    enabled: Option<bool>,
    ready: bool,
    readiness_timeout: Option<Duration>,
    gate: Option<Arc<Gate>>,
    inputs: Option<KeySet>,
    outputs: Option<KeySet>,
}

impl FakeAdapterBuilder {
    pub fn inputs(mut self, items: &[&str]) -> Self {
        self.inputs = Some(keys(items));
        self
    }

    pub fn outputs(mut self, items: &[&str]) -> Self {
        self.outputs = Some(keys(items));
        self
    }

    /// Demand-driven adapter, starts disabled
    pub fn on_demand(mut self) -> Self {
        self.auto_start = false;
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = Some(enabled);
        self
    }

    pub fn not_ready(mut self) -> Self {
        self.ready = false;
        self
    }

    pub fn readiness_timeout(mut self, timeout: Duration) -> Self {
        self.readiness_timeout = Some(timeout);
        self
    }

    pub fn gated(mut self, gate: Arc<Gate>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn build(self) -> Arc<FakeAdapter> {
        Arc::new(FakeAdapter {
            enabled: AtomicBool::new(self.enabled.unwrap_or(self.auto_start)),
            name: self.name,
            auto_start: self.auto_start,
            ready: AtomicBool::new(self.ready),
            readiness_timeout: self.readiness_timeout,
            gate: self.gate,
            inputs: RwLock::new(self.inputs),
            outputs: RwLock::new(self.outputs),
            requested_in: RwLock::new(None),
            requested_out: RwLock::new(None),
            received: Mutex::new(Vec::new()),
            fail: AtomicBool::new(false),
            panic: AtomicBool::new(false),
            panic_on_ready: AtomicBool::new(false),
            ready_checks: AtomicUsize::new(0),
            last_timeout: Mutex::new(None),
            enable_calls: AtomicUsize::new(0),
            requested_in_updates: AtomicUsize::new(0),
            requested_out_updates: AtomicUsize::new(0),
        })
    }
}

impl Adapter for FakeAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn auto_start(&self) -> bool {
        self.auto_start
    }

    fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    fn set_enabled(&self, enabled: bool) {
        self.enable_calls.fetch_add(1, Ordering::SeqCst);
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    fn readiness_timeout(&self) -> Option<Duration> {
        self.readiness_timeout
    }

    fn wait_for_ready(&self, timeout: Duration) -> bool {
        self.ready_checks.fetch_add(1, Ordering::SeqCst);
        *self.last_timeout.lock() = Some(timeout);
        if let Some(gate) = &self.gate {
            gate.pass();
        }
        if self.panic_on_ready.load(Ordering::SeqCst) {
            panic!("{} failed its readiness probe", self.name);
        }
        self.ready.load(Ordering::SeqCst)
    }
}

impl InputAdapter for FakeAdapter {
    fn input_keys(&self) -> Option<KeySet> {
        self.inputs.read().clone()
    }

    fn requested_input_keys(&self) -> Option<KeySet> {
        self.requested_in.read().clone()
    }

    fn set_requested_input_keys(&self, keys: Option<KeySet>) {
        self.requested_in_updates.fetch_add(1, Ordering::SeqCst);
        *self.requested_in.write() = keys;
    }

    fn accept(&self, batch: &[Measurement]) -> Result<(), ContractError> {
        if self.panic.load(Ordering::SeqCst) {
            panic!("{} exploded", self.name);
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(ContractError::delivery(&self.name, "queue full"));
        }
        self.received.lock().push(batch.to_vec());
        Ok(())
    }
}

impl OutputAdapter for FakeAdapter {
    fn output_keys(&self) -> Option<KeySet> {
        self.outputs.read().clone()
    }

    fn requested_output_keys(&self) -> Option<KeySet> {
        self.requested_out.read().clone()
    }

    fn set_requested_output_keys(&self, keys: Option<KeySet>) {
        self.requested_out_updates.fetch_add(1, Ordering::SeqCst);
        *self.requested_out.write() = keys;
    }
}

impl Producer for FakeAdapter {}
impl Processor for FakeAdapter {}
impl Sink for FakeAdapter {}

/// Spawner that parks jobs until the test runs them
#[derive(Default)]
pub struct ManualSpawner {
    jobs: Mutex<Vec<Job>>,
}

impl ManualSpawner {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn pending(&self) -> usize {
        self.jobs.lock().len()
    }

    /// Run every parked job on the calling thread, returning how many ran
    pub fn run_all(&self) -> usize {
        let jobs: Vec<Job> = std::mem::take(&mut *self.jobs.lock());
        let count = jobs.len();
        for job in jobs {
            job();
        }
        count
    }

    /// Drop parked jobs without running them
    pub fn discard_all(&self) -> usize {
        let jobs: Vec<Job> = std::mem::take(&mut *self.jobs.lock());
        jobs.len()
    }
}

impl Spawner for ManualSpawner {
    fn spawn(&self, job: Job) -> std::io::Result<()> {
        self.jobs.lock().push(job);
        Ok(())
    }
}
