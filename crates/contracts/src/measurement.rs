//! Measurement - unit of streaming time-series data

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::MeasurementKey;

/// Ordered, deduplicated set of measurement keys
pub type KeySet = BTreeSet<MeasurementKey>;

/// One reading of one measurement key.
///
/// Measurements are immutable once produced and always travel in batches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    /// Identity of the data point
    pub key: MeasurementKey,

    /// Reading value
    pub value: f64,

    /// Timestamp of the reading (seconds)
    pub timestamp: f64,
}

impl Measurement {
    /// Create a new measurement
    pub fn new(key: MeasurementKey, value: f64, timestamp: f64) -> Self {
        Self {
            key,
            value,
            timestamp,
        }
    }
}

/// Keys of `declared` that are also in `universe`.
///
/// An undeclared (`None`) or empty side yields an empty set.
pub fn intersect(declared: Option<&KeySet>, universe: &KeySet) -> KeySet {
    match declared {
        Some(keys) => keys.intersection(universe).cloned().collect(),
        None => KeySet::new(),
    }
}

/// True when the key set holds at least one key.
#[inline]
pub fn has_demand(keys: Option<&KeySet>) -> bool {
    keys.is_some_and(|k| !k.is_empty())
}

/// Compare two requested key sets, treating `None` and empty as equal.
pub fn same_demand(a: Option<&KeySet>, b: Option<&KeySet>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a == b,
        (Some(k), None) | (None, Some(k)) => k.is_empty(),
        (None, None) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(items: &[&str]) -> KeySet {
        items.iter().map(|s| s.parse().unwrap()).collect()
    }

    #[test]
    fn test_intersect() {
        let declared = keys(&["A:1", "A:2", "A:3"]);
        let universe = keys(&["A:2", "A:3", "B:1"]);

        assert_eq!(intersect(Some(&declared), &universe), keys(&["A:2", "A:3"]));
        assert!(intersect(None, &universe).is_empty());
        assert!(intersect(Some(&declared), &KeySet::new()).is_empty());
    }

    #[test]
    fn test_has_demand() {
        assert!(!has_demand(None));
        assert!(!has_demand(Some(&KeySet::new())));
        assert!(has_demand(Some(&keys(&["A:1"]))));
    }

    #[test]
    fn test_same_demand_treats_none_as_empty() {
        let empty = KeySet::new();
        let one = keys(&["A:1"]);

        assert!(same_demand(None, None));
        assert!(same_demand(None, Some(&empty)));
        assert!(same_demand(Some(&empty), None));
        assert!(same_demand(Some(&one), Some(&keys(&["A:1"]))));
        assert!(!same_demand(None, Some(&one)));
        assert!(!same_demand(Some(&one), Some(&keys(&["A:2"]))));
    }
}
