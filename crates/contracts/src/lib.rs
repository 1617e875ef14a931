//! # Contracts
//!
//! Frozen interface contracts shared by the routing engine, the adapters and the CLI.
//! All business crates depend on this crate, never the other way around.
//!
//! ## Data model
//! - A [`Measurement`] is one reading of one [`MeasurementKey`], always moved in batches
//! - Adapters are consumed only through the capability traits in [`adapter`]
//! - `Option<KeySet>` models a nullable key set: `None` on an input side means
//!   "wants everything"

pub mod adapter;
mod blueprint;
mod error;
mod key;
mod measurement;
mod writer;

pub use adapter::{
    Adapter, AdapterRole, InputAdapter, MeasurementCallback, OutputAdapter, Processor, Producer,
    Sink,
};
pub use blueprint::*;
pub use error::*;
pub use key::MeasurementKey;
pub use measurement::{has_demand, intersect, same_demand, KeySet, Measurement};
pub use writer::{BatchWriter, LocalBatchWriter};
