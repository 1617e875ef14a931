//! BatchWriter trait - backend of a queued adapter
//!
//! The engine hands batches to adapters synchronously; queued adapters move
//! them to a worker task which drives a `BatchWriter`.

use crate::{ContractError, Measurement};

/// Asynchronous batch consumer
///
/// All writer implementations must implement this trait.
#[trait_variant::make(BatchWriter: Send)]
pub trait LocalBatchWriter {
    /// Writer name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Write one batch
    ///
    /// # Errors
    /// Returns write error (should include context)
    async fn write(&mut self, batch: &[Measurement]) -> Result<(), ContractError>;

    /// Flush buffer (if any)
    async fn flush(&mut self) -> Result<(), ContractError>;

    /// Close writer
    async fn close(&mut self) -> Result<(), ContractError>;
}
