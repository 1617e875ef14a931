//! MeasurementKey - Cheap-to-clone measurement identifier
//!
//! Uses Arc<str> for the source so clones on the dispatch path never allocate.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use std::sync::Arc;

use crate::ContractError;

/// Identity of one logical data point, e.g. `PPA:12`.
///
/// A key is the pair of a source (historian, device or calculation namespace)
/// and a numeric point id within that source. Ordering is by source, then id.
///
/// # Examples
/// ```
/// use contracts::MeasurementKey;
///
/// let key: MeasurementKey = "PPA:12".parse().unwrap();
/// assert_eq!(key.source(), "PPA");
/// assert_eq!(key.id(), 12);
/// assert_eq!(key.to_string(), "PPA:12");
/// ```
#[derive(Clone)]
pub struct MeasurementKey {
    source: Arc<str>,
    id: u32,
}

impl MeasurementKey {
    /// Create a new key.
    #[inline]
    pub fn new(source: &str, id: u32) -> Self {
        Self {
            source: Arc::from(source),
            id,
        }
    }

    /// Source namespace of the key.
    #[inline]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Point id within the source.
    #[inline]
    pub fn id(&self) -> u32 {
        self.id
    }
}

impl FromStr for MeasurementKey {
    type Err = ContractError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (source, id) = s
            .trim()
            .rsplit_once(':')
            .ok_or_else(|| ContractError::invalid_key(s, "expected SOURCE:ID"))?;

        if source.is_empty() {
            return Err(ContractError::invalid_key(s, "source cannot be empty"));
        }

        let id = id
            .parse::<u32>()
            .map_err(|e| ContractError::invalid_key(s, format!("bad point id: {e}")))?;

        Ok(Self::new(source, id))
    }
}

impl fmt::Display for MeasurementKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.source, self.id)
    }
}

impl fmt::Debug for MeasurementKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MeasurementKey({}:{})", self.source, self.id)
    }
}

impl PartialEq for MeasurementKey {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        // Fast path: same Arc pointer
        self.id == other.id
            && (Arc::ptr_eq(&self.source, &other.source) || self.source == other.source)
    }
}

impl Eq for MeasurementKey {}

impl Ord for MeasurementKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.source
            .as_ref()
            .cmp(other.source.as_ref())
            .then(self.id.cmp(&other.id))
    }
}

impl PartialOrd for MeasurementKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Hash for MeasurementKey {
    #[inline]
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.source.hash(state);
        self.id.hash(state);
    }
}

impl Serialize for MeasurementKey {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for MeasurementKey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
