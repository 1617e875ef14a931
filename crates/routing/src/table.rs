//! Route table - immutable key → destination snapshot
//!
//! A table is built once per calculation, then published wholesale. Destinations
//! are stored once per table and referenced by slot index, so the dispatch scan
//! can group measurements per adapter in a flat `Vec` instead of hashing adapters.

use std::collections::HashMap;
use std::sync::Arc;

use contracts::{Adapter, InputAdapter, KeySet, MeasurementKey, Processor, Sink};
use parking_lot::RwLock;
use serde::Serialize;

/// Routes for one destination role
pub struct Routes<T: ?Sized> {
    /// Destination adapters, indexed by slot
    adapters: Vec<Arc<T>>,
    /// key → slots interested in that key
    by_key: HashMap<MeasurementKey, Vec<usize>>,
    /// Slots receiving every measurement
    broadcast: Vec<usize>,
}

impl<T: ?Sized + InputAdapter> Routes<T> {
    fn empty() -> Self {
        Self {
            adapters: Vec::new(),
            by_key: HashMap::new(),
            broadcast: Vec::new(),
        }
    }

    /// Adapter at `slot`
    #[inline]
    pub fn adapter(&self, slot: usize) -> &Arc<T> {
        &self.adapters[slot]
    }

    /// Number of destination slots
    #[inline]
    pub fn slot_count(&self) -> usize {
        self.adapters.len()
    }

    /// Slots routed for `key` (empty when none)
    #[inline]
    pub fn slots_for(&self, key: &MeasurementKey) -> &[usize] {
        self.by_key.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Slots receiving every measurement
    #[inline]
    pub fn broadcast_slots(&self) -> &[usize] {
        &self.broadcast
    }

    /// Adapters routed for `key`
    pub fn adapters_for(&self, key: &MeasurementKey) -> impl Iterator<Item = &Arc<T>> {
        self.slots_for(key).iter().map(|&slot| &self.adapters[slot])
    }

    /// Adapters receiving every measurement
    pub fn broadcast_adapters(&self) -> impl Iterator<Item = &Arc<T>> {
        self.broadcast.iter().map(|&slot| &self.adapters[slot])
    }

    /// Routed keys
    pub fn keys(&self) -> impl Iterator<Item = &MeasurementKey> {
        self.by_key.keys()
    }

    fn summarize(&self) -> RoutesSummary {
        let mut routes: Vec<KeyRoute> = self
            .by_key
            .iter()
            .map(|(key, slots)| KeyRoute {
                key: key.to_string(),
                adapters: slots
                    .iter()
                    .map(|&slot| self.adapters[slot].name().to_string())
                    .collect(),
            })
            .collect();
        routes.sort_by(|a, b| a.key.cmp(&b.key));

        RoutesSummary {
            routes,
            broadcast: self
                .broadcast_adapters()
                .map(|a| a.name().to_string())
                .collect(),
        }
    }
}

/// Builder for one role's routes
pub struct RoutesBuilder<T: ?Sized> {
    routes: Routes<T>,
}

impl<T: ?Sized + InputAdapter> RoutesBuilder<T> {
    pub fn new() -> Self {
        Self {
            routes: Routes::empty(),
        }
    }

    fn slot(&mut self, adapter: Arc<T>) -> usize {
        self.routes.adapters.push(adapter);
        self.routes.adapters.len() - 1
    }

    /// Route `adapter` for each of `keys`
    pub fn route(&mut self, adapter: Arc<T>, keys: &KeySet) {
        let slot = self.slot(adapter);
        for key in keys {
            let slots = self.routes.by_key.entry(key.clone()).or_default();
            if !slots.contains(&slot) {
                slots.push(slot);
            }
        }
    }

    /// Deliver every measurement to `adapter`
    pub fn broadcast(&mut self, adapter: Arc<T>) {
        let slot = self.slot(adapter);
        self.routes.broadcast.push(slot);
    }

    pub fn build(self) -> Routes<T> {
        self.routes
    }
}

impl<T: ?Sized + InputAdapter> Default for RoutesBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Immutable routing snapshot for processors and sinks
pub struct RouteTable {
    generation: u64,
    processors: Routes<dyn Processor>,
    sinks: Routes<dyn Sink>,
}

impl RouteTable {
    /// Table with no routes (before the first calculation, after shutdown)
    pub fn empty() -> Self {
        Self {
            generation: 0,
            processors: Routes::empty(),
            sinks: Routes::empty(),
        }
    }

    /// Assemble a table from built routes
    pub fn new(
        generation: u64,
        processors: Routes<dyn Processor>,
        sinks: Routes<dyn Sink>,
    ) -> Self {
        Self {
            generation,
            processors,
            sinks,
        }
    }

    /// Calculation that produced this table (0 = never calculated)
    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    #[inline]
    pub fn processors(&self) -> &Routes<dyn Processor> {
        &self.processors
    }

    #[inline]
    pub fn sinks(&self) -> &Routes<dyn Sink> {
        &self.sinks
    }

    /// Names of processors routed for `key`
    pub fn processors_for(&self, key: &MeasurementKey) -> Vec<&str> {
        self.processors.adapters_for(key).map(|a| a.name()).collect()
    }

    /// Names of sinks routed for `key`
    pub fn sinks_for(&self, key: &MeasurementKey) -> Vec<&str> {
        self.sinks.adapters_for(key).map(|a| a.name()).collect()
    }

    /// Distinct keys with at least one route
    pub fn key_count(&self) -> usize {
        let mut keys: Vec<&MeasurementKey> =
            self.processors.keys().chain(self.sinks.keys()).collect();
        keys.sort();
        keys.dedup();
        keys.len()
    }

    /// True when nothing would be delivered by routed dispatch
    pub fn is_empty(&self) -> bool {
        self.processors.by_key.is_empty()
            && self.sinks.by_key.is_empty()
            && self.processors.broadcast.is_empty()
            && self.sinks.broadcast.is_empty()
    }

    /// Serializable view for display
    pub fn summary(&self) -> RouteTableSummary {
        RouteTableSummary {
            generation: self.generation,
            processors: self.processors.summarize(),
            sinks: self.sinks.summarize(),
        }
    }

    /// Metrics view
    pub fn shape(&self) -> observability::TableShape {
        observability::TableShape {
            route_keys: self.key_count(),
            processor_broadcast: self.processors.broadcast.len(),
            sink_broadcast: self.sinks.broadcast.len(),
        }
    }
}

impl std::fmt::Debug for RouteTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteTable")
            .field("generation", &self.generation)
            .field("processor_keys", &self.processors.by_key.len())
            .field("sink_keys", &self.sinks.by_key.len())
            .field("processor_broadcast", &self.processors.broadcast.len())
            .field("sink_broadcast", &self.sinks.broadcast.len())
            .finish()
    }
}

/// One key and the adapters it is routed to
#[derive(Debug, Clone, Serialize)]
pub struct KeyRoute {
    pub key: String,
    pub adapters: Vec<String>,
}

/// Routes of one role
#[derive(Debug, Clone, Serialize)]
pub struct RoutesSummary {
    pub routes: Vec<KeyRoute>,
    pub broadcast: Vec<String>,
}

/// Serializable route table
#[derive(Debug, Clone, Serialize)]
pub struct RouteTableSummary {
    pub generation: u64,
    pub processors: RoutesSummary,
    pub sinks: RoutesSummary,
}

/// Published table slot: many readers, one writer swapping whole tables
pub struct TableCell {
    current: RwLock<Arc<RouteTable>>,
}

impl TableCell {
    pub fn new() -> Self {
        Self {
            current: RwLock::new(Arc::new(RouteTable::empty())),
        }
    }

    /// Current table. The read lock is held only to clone the pointer.
    #[inline]
    pub fn load(&self) -> Arc<RouteTable> {
        Arc::clone(&self.current.read())
    }

    /// Swap in a new table, returning the previous one
    pub fn publish(&self, table: RouteTable) -> Arc<RouteTable> {
        let table = Arc::new(table);
        let mut current = self.current.write();
        std::mem::replace(&mut *current, table)
    }

    /// Swap in `table` only if `still_wanted` holds under the write lock.
    ///
    /// Lets a calculation racing shutdown lose cleanly instead of resurrecting
    /// routes after the empty table went in.
    pub fn publish_if(&self, table: RouteTable, still_wanted: impl FnOnce() -> bool) -> bool {
        let table = Arc::new(table);
        let mut current = self.current.write();
        if !still_wanted() {
            return false;
        }
        *current = table;
        true
    }
}

impl Default for TableCell {
    fn default() -> Self {
        Self::new()
    }
}
