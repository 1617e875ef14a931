//! RoutingEngine - trigger, ingest and disposal surface
//!
//! Owns the adapter registries, the published route table and the
//! calculation queue. Triggers return immediately; calculations run on the
//! configured [`Spawner`] and never overlap.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use contracts::{
    Adapter, DispatchMode, EngineSettings, Measurement, MeasurementCallback, Processor, Producer,
    Sink,
};
use observability::{record_calculation, record_dispatch, CalculationAggregator, CalculationSummary};
use parking_lot::Mutex;
use tracing::{debug, error, info, instrument, warn};

use crate::calculator::{
    calculate_routes, BlockingSpawner, CalculationQueue, Job, Spawner, TriggerOutcome, WorkerGuard,
};
use crate::demand::{propagate_demand, DemandReport};
use crate::dispatcher::{dispatch_broadcast, dispatch_routed};
use crate::error::{Result, RoutingError};
use crate::registry::Registries;
use crate::stats::{DispatchSummary, EngineStats, StatsSnapshot};
use crate::table::{RouteTable, TableCell};

struct EngineShared {
    settings: EngineSettings,
    registries: Registries,
    table: TableCell,
    queue: Arc<CalculationQueue>,
    spawner: Arc<dyn Spawner>,
    stats: EngineStats,
    generation: AtomicU64,
    aggregator: Mutex<CalculationAggregator>,
    last_demand: Mutex<DemandReport>,
}

impl EngineShared {
    fn request(self: &Arc<Self>) -> bool {
        match self.queue.request() {
            TriggerOutcome::Scheduled => {
                debug!("Route calculation scheduled");
                self.spawn_worker();
                true
            }
            TriggerOutcome::Queued => {
                debug!("Route calculation queued behind running one");
                true
            }
            TriggerOutcome::Merged => {
                debug!("Route calculation already queued, request merged");
                true
            }
            TriggerOutcome::Disposed => {
                debug!("Route calculation requested after shutdown, ignored");
                false
            }
        }
    }

    fn spawn_worker(self: &Arc<Self>) {
        let shared = Arc::clone(self);
        let guard = WorkerGuard::new(Arc::clone(&self.queue));
        let job: Job = Box::new(move || {
            while shared.queue.begin_next() {
                shared.run_calculation();
            }
            guard.disarm();
        });

        // A failed spawn drops the job, and its guard frees the queue
        if let Err(e) = self.spawner.spawn(job) {
            error!(error = %e, "Failed to start route calculation worker");
        }
    }

    #[instrument(
        name = "route_calculation",
        skip(self),
        fields(generation = tracing::field::Empty)
    )]
    fn run_calculation(&self) {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::Span::current().record("generation", generation);
        let started = Instant::now();

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            let calculation = calculate_routes(
                &self.registries,
                self.settings.readiness_timeout(),
                generation,
            );
            let shape = calculation.table.shape();
            let published = self
                .table
                .publish_if(calculation.table, || !self.queue.is_disposed());
            if !published {
                return None;
            }
            let demand = propagate_demand(&self.registries);
            Some((shape, calculation.readiness_timeouts, demand))
        }));
        let elapsed = started.elapsed();

        match outcome {
            Ok(Some((shape, readiness_timeouts, demand))) => {
                self.stats.inc_calculations();
                self.stats.add_readiness_timeouts(readiness_timeouts);
                record_calculation(true, elapsed, &shape);
                self.aggregator
                    .lock()
                    .update(true, elapsed, &shape, readiness_timeouts);

                info!(
                    generation,
                    route_keys = shape.route_keys,
                    processor_broadcast = shape.processor_broadcast,
                    sink_broadcast = shape.sink_broadcast,
                    readiness_timeouts,
                    enabled = demand.enabled.len(),
                    disabled = demand.disabled.len(),
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Route table published"
                );
                *self.last_demand.lock() = demand;
            }
            Ok(None) => {
                debug!(generation, "Engine shut down mid-calculation, table discarded");
            }
            Err(payload) => {
                let err = RoutingError::from_panic(payload.as_ref());
                let shape = Default::default();
                self.stats.inc_failed_calculations();
                record_calculation(false, elapsed, &shape);
                self.aggregator.lock().update(false, elapsed, &shape, 0);
                error!(
                    generation,
                    error = %err,
                    "Route calculation failed, previous table stays in force"
                );
            }
        }
    }

    fn dispatch(&self, mode: DispatchMode, batch: &[Measurement]) -> DispatchSummary {
        if self.queue.is_disposed() {
            return DispatchSummary::default();
        }

        let summary = match mode {
            DispatchMode::Routed => dispatch_routed(&self.table.load(), batch),
            DispatchMode::Broadcast => dispatch_broadcast(&self.registries, batch),
        };
        record_dispatch(mode, summary.measurements);
        self.stats.record_dispatch(&summary);
        summary
    }
}

/// Measurement routing engine
///
/// Not `Clone`: share it behind an `Arc`. Dropping it disposes the engine
/// without waiting for an in-flight calculation; call [`shutdown`](Self::shutdown)
/// for a bounded drain.
pub struct RoutingEngine {
    shared: Arc<EngineShared>,
}

impl RoutingEngine {
    /// Engine running calculations on the default [`BlockingSpawner`]
    pub fn new(settings: EngineSettings) -> Self {
        Self::with_spawner(settings, Arc::new(BlockingSpawner))
    }

    /// Engine running calculations on `spawner`
    pub fn with_spawner(settings: EngineSettings, spawner: Arc<dyn Spawner>) -> Self {
        info!(
            readiness_timeout_ms = settings.readiness_timeout_ms,
            dispatch_mode = ?settings.dispatch_mode,
            "Routing engine created"
        );
        Self {
            shared: Arc::new(EngineShared {
                settings,
                registries: Registries::new(),
                table: TableCell::new(),
                queue: Arc::new(CalculationQueue::new()),
                spawner,
                stats: EngineStats::new(),
                generation: AtomicU64::new(0),
                aggregator: Mutex::new(CalculationAggregator::new()),
                last_demand: Mutex::new(DemandReport::default()),
            }),
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.shared.settings
    }

    /// Raw registries, for owners batching several mutations.
    ///
    /// Changes made here must be followed by [`request_calculation`](Self::request_calculation).
    pub fn registries(&self) -> &Registries {
        &self.shared.registries
    }

    pub fn add_producer(&self, producer: Arc<dyn Producer>) -> Result<()> {
        self.ensure_running()?;
        self.shared.registries.add_producer(producer)?;
        self.request_calculation();
        Ok(())
    }

    pub fn add_processor(&self, processor: Arc<dyn Processor>) -> Result<()> {
        self.ensure_running()?;
        self.shared.registries.add_processor(processor)?;
        self.request_calculation();
        Ok(())
    }

    pub fn add_sink(&self, sink: Arc<dyn Sink>) -> Result<()> {
        self.ensure_running()?;
        self.shared.registries.add_sink(sink)?;
        self.request_calculation();
        Ok(())
    }

    /// Remove an adapter of any role. Returns false if no adapter had that name.
    pub fn remove_adapter(&self, name: &str) -> bool {
        let removed = self.shared.registries.remove(name);
        if removed {
            self.request_calculation();
        }
        removed
    }

    fn ensure_running(&self) -> Result<()> {
        if self.is_shut_down() {
            return Err(RoutingError::Disposed);
        }
        Ok(())
    }

    /// Ask for the route table to be recalculated.
    ///
    /// Fire-and-forget. Returns false only when the engine is shut down.
    pub fn request_calculation(&self) -> bool {
        self.shared.request()
    }

    /// Routed delivery through the current table
    pub fn dispatch(&self, batch: &[Measurement]) -> DispatchSummary {
        self.shared.dispatch(DispatchMode::Routed, batch)
    }

    /// Unfiltered delivery to every processor and sink
    pub fn broadcast(&self, batch: &[Measurement]) -> DispatchSummary {
        self.shared.dispatch(DispatchMode::Broadcast, batch)
    }

    pub fn dispatch_with_mode(&self, mode: DispatchMode, batch: &[Measurement]) -> DispatchSummary {
        self.shared.dispatch(mode, batch)
    }

    /// Callback for producers and processors to publish through.
    ///
    /// Uses the configured dispatch mode. Holds only a weak reference, so it
    /// does nothing once the engine is gone.
    pub fn publisher(&self) -> MeasurementCallback {
        let shared = Arc::downgrade(&self.shared);
        Arc::new(move |batch: Vec<Measurement>| {
            if let Some(shared) = shared.upgrade() {
                shared.dispatch(shared.settings.dispatch_mode, &batch);
            }
        })
    }

    /// Currently published table
    pub fn route_table(&self) -> Arc<RouteTable> {
        self.shared.table.load()
    }

    /// Calculations that published a table
    pub fn calculation_count(&self) -> u64 {
        self.shared.stats.calculations()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.shared.stats.snapshot()
    }

    pub fn calculation_summary(&self) -> CalculationSummary {
        self.shared.aggregator.lock().summary()
    }

    /// Demand decisions of the most recent published calculation
    pub fn last_demand(&self) -> DemandReport {
        self.shared.last_demand.lock().clone()
    }

    /// Block until no calculation is running or queued.
    ///
    /// Returns false if `timeout` elapsed first.
    pub fn wait_for_idle(&self, timeout: Duration) -> bool {
        self.shared.queue.wait_idle(timeout)
    }

    pub fn is_shut_down(&self) -> bool {
        self.shared.queue.is_disposed()
    }

    /// Stop accepting work, drain an in-flight calculation and clear the table.
    ///
    /// Safe to call more than once. A queued calculation is dropped. Returns
    /// false if the in-flight calculation outlived `timeout`; it then finishes
    /// in the background without publishing.
    #[instrument(name = "routing_engine_shutdown", skip(self))]
    pub fn shutdown(&self, timeout: Duration) -> bool {
        if !self.shared.queue.dispose() {
            debug!("Routing engine already shut down");
            return true;
        }

        let drained = self.shared.queue.wait_idle(timeout);
        if !drained {
            warn!(
                timeout_ms = timeout.as_millis() as u64,
                "Route calculation still running at shutdown"
            );
        }
        self.shared.table.publish(RouteTable::empty());

        let stats = self.shared.stats.snapshot();
        info!(
            calculations = stats.calculations,
            measurements = stats.measurements,
            "Routing engine shut down"
        );
        drained
    }
}

impl Drop for RoutingEngine {
    fn drop(&mut self) {
        self.shared.queue.dispose();
    }
}
