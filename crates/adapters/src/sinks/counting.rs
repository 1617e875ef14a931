//! CountingSink - tallies received measurements per key

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use contracts::{BatchWriter, ContractError, Measurement, MeasurementKey};
use parking_lot::Mutex;
use serde::Serialize;

/// Per-key counts shared between a [`CountingSink`] and whoever inspects it
#[derive(Debug, Clone, Default)]
pub struct SinkCounts {
    inner: Arc<Mutex<HashMap<MeasurementKey, u64>>>,
}

impl SinkCounts {
    pub fn new() -> Self {
        Self::default()
    }

    fn add(&self, batch: &[Measurement]) {
        let mut counts = self.inner.lock();
        for m in batch {
            *counts.entry(m.key.clone()).or_insert(0) += 1;
        }
    }

    /// Measurements received for `key`
    pub fn get(&self, key: &MeasurementKey) -> u64 {
        self.inner.lock().get(key).copied().unwrap_or(0)
    }

    /// Measurements received across all keys
    pub fn total(&self) -> u64 {
        self.inner.lock().values().sum()
    }

    /// Sorted copy for reporting
    pub fn snapshot(&self) -> CountsSnapshot {
        let per_key: BTreeMap<String, u64> = self
            .inner
            .lock()
            .iter()
            .map(|(k, n)| (k.to_string(), *n))
            .collect();
        CountsSnapshot {
            total: per_key.values().sum(),
            per_key,
        }
    }
}

/// Serializable per-key counts
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CountsSnapshot {
    pub total: u64,
    pub per_key: BTreeMap<String, u64>,
}

/// Sink that only counts what it receives
pub struct CountingSink {
    name: String,
    counts: SinkCounts,
}

impl CountingSink {
    pub fn new(name: impl Into<String>, counts: SinkCounts) -> Self {
        Self {
            name: name.into(),
            counts,
        }
    }
}

impl BatchWriter for CountingSink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn write(&mut self, batch: &[Measurement]) -> Result<(), ContractError> {
        self.counts.add(batch);
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), ContractError> {
        Ok(())
    }

    async fn close(&mut self) -> Result<(), ContractError> {
        Ok(())
    }
}
