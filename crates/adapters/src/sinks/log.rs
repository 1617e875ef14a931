//! LogSink - logs batch summaries via tracing

use contracts::{BatchWriter, ContractError, Measurement};
use tracing::{info, instrument};

/// Sink that logs batch summaries for debugging
pub struct LogSink {
    name: String,
    batches: u64,
}

impl LogSink {
    /// Create a new LogSink with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            batches: 0,
        }
    }

    fn log_batch_summary(&self, batch: &[Measurement]) {
        let first = batch.first().map(|m| m.key.to_string()).unwrap_or_default();
        let newest = batch
            .iter()
            .map(|m| m.timestamp)
            .fold(f64::NEG_INFINITY, f64::max);

        info!(
            sink = %self.name,
            batch = self.batches,
            measurements = batch.len(),
            first_key = %first,
            newest_timestamp = newest,
            "Batch received"
        );
    }
}

impl BatchWriter for LogSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "log_sink_write",
        skip(self, batch),
        fields(sink = %self.name, measurements = batch.len())
    )]
    async fn write(&mut self, batch: &[Measurement]) -> Result<(), ContractError> {
        self.batches += 1;
        self.log_batch_summary(batch);
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), ContractError> {
        Ok(())
    }

    #[instrument(name = "log_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        info!(sink = %self.name, batches = self.batches, "LogSink closed");
        Ok(())
    }
}
