//! Route calculator
//!
//! Two halves:
//! - [`CalculationQueue`]: single-slot debounce. At most one calculation runs,
//!   at most one more waits behind it, every other trigger is merged away.
//! - [`calculate_routes`]: builds a fresh [`RouteTable`] from registry snapshots.
//!
//! The queue never runs work itself. `request` tells the caller whether a new
//! worker must be spawned; the worker then drains the slot with `begin_next`
//! until nothing is pending.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use contracts::{AdapterRole, InputAdapter};
use observability::record_readiness_timeout;
use parking_lot::{Condvar, Mutex};
use tracing::{trace, warn};

use crate::registry::Registries;
use crate::table::{RouteTable, Routes, RoutesBuilder};

/// Unit of background work
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Background worker pool the calculation runs on
pub trait Spawner: Send + Sync {
    /// Run `job` off the calling thread.
    ///
    /// # Errors
    /// Returns an error when no worker could be started. The job is dropped.
    fn spawn(&self, job: Job) -> std::io::Result<()>;
}

/// Default spawner.
///
/// Uses the Tokio blocking pool when called from inside a runtime (calculation
/// blocks on adapter readiness), otherwise a dedicated OS thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct BlockingSpawner;

impl Spawner for BlockingSpawner {
    fn spawn(&self, job: Job) -> std::io::Result<()> {
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn_blocking(job);
                Ok(())
            }
            Err(_) => std::thread::Builder::new()
                .name("route-calculation".into())
                .spawn(job)
                .map(|_| ()),
        }
    }
}

/// What a trigger did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOutcome {
    /// Nothing was running; the caller must start a worker
    Scheduled,
    /// A calculation is running; one follow-up is now queued behind it
    Queued,
    /// A calculation was already queued; nothing to do
    Merged,
    /// Engine torn down; nothing to do
    Disposed,
}

#[derive(Debug, Default)]
struct QueueState {
    pending: bool,
    running: bool,
    disposed: bool,
}

/// Single-slot calculation queue
#[derive(Debug, Default)]
pub struct CalculationQueue {
    state: Mutex<QueueState>,
    idle: Condvar,
    /// Mirrors `state.disposed` for lock-free reads on the dispatch path
    disposed: AtomicBool,
}

impl CalculationQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a calculation request. Never blocks beyond the state lock.
    pub fn request(&self) -> TriggerOutcome {
        let mut state = self.state.lock();
        if state.disposed {
            return TriggerOutcome::Disposed;
        }
        if state.pending {
            return TriggerOutcome::Merged;
        }

        state.pending = true;
        if state.running {
            TriggerOutcome::Queued
        } else {
            state.running = true;
            TriggerOutcome::Scheduled
        }
    }

    /// Called by the worker before each calculation.
    ///
    /// Returns false once there is nothing left to run, at which point the
    /// worker has already been released.
    pub fn begin_next(&self) -> bool {
        let mut state = self.state.lock();
        if state.disposed || !state.pending {
            state.pending = false;
            state.running = false;
            self.idle.notify_all();
            return false;
        }
        state.pending = false;
        true
    }

    /// Release a worker that will never drain the slot (spawn failure, dropped job).
    ///
    /// The pending request goes with it so the next trigger can schedule again.
    pub fn release_worker(&self) {
        let mut state = self.state.lock();
        state.pending = false;
        state.running = false;
        self.idle.notify_all();
    }

    /// Wait until no calculation is running or queued.
    ///
    /// Returns false if `timeout` elapsed first.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        while state.running {
            if self.idle.wait_until(&mut state, deadline).timed_out() {
                return !state.running;
            }
        }
        true
    }

    /// Refuse further requests and drop a queued one.
    ///
    /// Returns false if the queue was already disposed.
    pub fn dispose(&self) -> bool {
        let mut state = self.state.lock();
        if state.disposed {
            return false;
        }
        state.disposed = true;
        state.pending = false;
        self.disposed.store(true, Ordering::Release);
        true
    }

    /// Lock-free; safe to call on every dispatched batch
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    pub fn is_running(&self) -> bool {
        self.state.lock().running
    }

    pub fn is_pending(&self) -> bool {
        self.state.lock().pending
    }
}

/// Releases the queue if a worker job is dropped without finishing
pub struct WorkerGuard {
    queue: Arc<CalculationQueue>,
    armed: bool,
}

impl WorkerGuard {
    pub fn new(queue: Arc<CalculationQueue>) -> Self {
        Self { queue, armed: true }
    }

    /// Worker drained the queue normally
    pub fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for WorkerGuard {
    fn drop(&mut self) {
        if self.armed {
            self.queue.release_worker();
        }
    }
}

/// Output of one calculation
pub struct Calculation {
    pub table: RouteTable,
    /// Adapters that missed their readiness deadline and fell back to broadcast
    pub readiness_timeouts: u64,
}

/// Build a route table from the current registry contents.
///
/// Registry locks are held only while copying each adapter list. Readiness
/// probing and table construction run on the copies.
pub fn calculate_routes(
    registries: &Registries,
    default_timeout: Duration,
    generation: u64,
) -> Calculation {
    let mut readiness_timeouts = 0;

    let processors = route_role(
        registries.processors.snapshot(),
        AdapterRole::Processor,
        default_timeout,
        &mut readiness_timeouts,
    );
    let sinks = route_role(
        registries.sinks.snapshot(),
        AdapterRole::Sink,
        default_timeout,
        &mut readiness_timeouts,
    );

    Calculation {
        table: RouteTable::new(generation, processors, sinks),
        readiness_timeouts,
    }
}

fn route_role<T: ?Sized + InputAdapter>(
    adapters: Vec<Arc<T>>,
    role: AdapterRole,
    default_timeout: Duration,
    readiness_timeouts: &mut u64,
) -> Routes<T> {
    let mut builder = RoutesBuilder::new();

    for adapter in adapters {
        let timeout = adapter.readiness_timeout().unwrap_or(default_timeout);
        if !adapter.wait_for_ready(timeout) {
            warn!(
                adapter = adapter.name(),
                role = %role,
                timeout_ms = timeout.as_millis() as u64,
                "Adapter not ready in time, routing every measurement to it"
            );
            record_readiness_timeout(adapter.name(), role);
            *readiness_timeouts += 1;
            builder.broadcast(adapter);
            continue;
        }

        match adapter.input_keys() {
            None => builder.broadcast(adapter),
            Some(keys) if keys.is_empty() => {
                trace!(adapter = adapter.name(), role = %role, "No input keys declared");
            }
            Some(keys) => builder.route(adapter, &keys),
        }
    }

    builder.build()
}
