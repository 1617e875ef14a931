//! Adapter registries - externally owned, externally synchronized collections
//!
//! The engine only ever takes a registry lock for the time it needs to copy
//! the adapter list; calculation and dispatch run on the copy.

use std::sync::Arc;

use contracts::{Adapter, Processor, Producer, Sink};
use parking_lot::Mutex;

use crate::error::{Result, RoutingError};

/// One collection of adapters of a single role
pub struct AdapterRegistry<T: ?Sized> {
    adapters: Mutex<Vec<Arc<T>>>,
}

impl<T: ?Sized + Adapter> AdapterRegistry<T> {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            adapters: Mutex::new(Vec::new()),
        }
    }

    /// Add an adapter. Names must be unique within the registry.
    pub fn add(&self, adapter: Arc<T>) -> Result<()> {
        let mut adapters = self.adapters.lock();
        if adapters.iter().any(|a| a.name() == adapter.name()) {
            return Err(RoutingError::duplicate_adapter(adapter.name()));
        }
        adapters.push(adapter);
        Ok(())
    }

    /// Remove an adapter by name
    pub fn remove(&self, name: &str) -> Option<Arc<T>> {
        let mut adapters = self.adapters.lock();
        let idx = adapters.iter().position(|a| a.name() == name)?;
        Some(adapters.remove(idx))
    }

    /// Look up an adapter by name
    pub fn get(&self, name: &str) -> Option<Arc<T>> {
        self.adapters
            .lock()
            .iter()
            .find(|a| a.name() == name)
            .cloned()
    }

    /// Copy of the current adapter list, taken under the registry lock
    pub fn snapshot(&self) -> Vec<Arc<T>> {
        self.adapters.lock().clone()
    }

    pub fn names(&self) -> Vec<String> {
        self.adapters
            .lock()
            .iter()
            .map(|a| a.name().to_string())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.adapters.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.lock().is_empty()
    }
}

impl<T: ?Sized + Adapter> Default for AdapterRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// The three adapter collections the engine routes between
#[derive(Default)]
pub struct Registries {
    pub producers: AdapterRegistry<dyn Producer>,
    pub processors: AdapterRegistry<dyn Processor>,
    pub sinks: AdapterRegistry<dyn Sink>,
    /// Serializes cross-role name checks with the insert that follows
    membership: Mutex<()>,
}

impl Registries {
    /// Create empty registries
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether any registry already holds `name`
    pub fn contains(&self, name: &str) -> bool {
        self.producers.get(name).is_some()
            || self.processors.get(name).is_some()
            || self.sinks.get(name).is_some()
    }

    /// Add a producer whose name no registry holds yet
    pub fn add_producer(&self, producer: Arc<dyn Producer>) -> Result<()> {
        self.add_unique(&self.producers, producer)
    }

    /// Add a processor whose name no registry holds yet
    pub fn add_processor(&self, processor: Arc<dyn Processor>) -> Result<()> {
        self.add_unique(&self.processors, processor)
    }

    /// Add a sink whose name no registry holds yet
    pub fn add_sink(&self, sink: Arc<dyn Sink>) -> Result<()> {
        self.add_unique(&self.sinks, sink)
    }

    fn add_unique<T: ?Sized + Adapter>(
        &self,
        registry: &AdapterRegistry<T>,
        adapter: Arc<T>,
    ) -> Result<()> {
        let _membership = self.membership.lock();
        if self.contains(adapter.name()) {
            return Err(RoutingError::duplicate_adapter(adapter.name()));
        }
        registry.add(adapter)
    }

    /// Remove `name` from whichever registry holds it
    pub fn remove(&self, name: &str) -> bool {
        self.producers.remove(name).is_some()
            || self.processors.remove(name).is_some()
            || self.sinks.remove(name).is_some()
    }

    /// Total adapters across all roles
    pub fn adapter_count(&self) -> usize {
        self.producers.len() + self.processors.len() + self.sinks.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::FakeAdapter;

    #[test]
    fn test_add_rejects_duplicate_names() {
        let registry: AdapterRegistry<dyn Sink> = AdapterRegistry::new();
        registry.add(FakeAdapter::builder("a").build()).unwrap();

        let err = registry.add(FakeAdapter::builder("a").build()).unwrap_err();
        assert!(matches!(err, RoutingError::DuplicateAdapter { .. }));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_same_name_in_two_roles_races_to_one_winner() {
        use std::sync::Barrier;

        for _ in 0..200 {
            let registries = Arc::new(Registries::new());
            let barrier = Arc::new(Barrier::new(2));

            let as_producer = {
                let (registries, barrier) = (Arc::clone(&registries), Arc::clone(&barrier));
                std::thread::spawn(move || {
                    barrier.wait();
                    registries
                        .add_producer(FakeAdapter::builder("twin").build())
                        .is_ok()
                })
            };
            let as_sink = {
                let (registries, barrier) = (Arc::clone(&registries), Arc::clone(&barrier));
                std::thread::spawn(move || {
                    barrier.wait();
                    registries.add_sink(FakeAdapter::builder("twin").build()).is_ok()
                })
            };

            let wins = [as_producer.join().unwrap(), as_sink.join().unwrap()];
            assert_eq!(wins.iter().filter(|w| **w).count(), 1);
            assert_eq!(registries.adapter_count(), 1);
        }
    }

    #[test]
    fn test_remove_and_lookup() {
        let registries = Registries::new();
        registries
            .processors
            .add(FakeAdapter::builder("calc").build())
            .unwrap();
        registries
            .sinks
            .add(FakeAdapter::builder("archive").build())
            .unwrap();

        assert!(registries.contains("calc"));
        assert_eq!(registries.adapter_count(), 2);
        assert!(registries.remove("calc"));
        assert!(!registries.remove("calc"));
        assert!(!registries.contains("calc"));
        assert_eq!(registries.sinks.names(), vec!["archive".to_string()]);
    }

    #[test]
    fn test_snapshot_is_detached() {
        let registry: AdapterRegistry<dyn Producer> = AdapterRegistry::new();
        registry.add(FakeAdapter::builder("p1").build()).unwrap();

        let snapshot = registry.snapshot();
        registry.add(FakeAdapter::builder("p2").build()).unwrap();

        assert_eq!(snapshot.len(), 1);
        assert_eq!(registry.len(), 2);
    }
}
