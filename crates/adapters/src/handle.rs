//! AdapterHandle - isolated queue and worker task behind an adapter's `accept`
//!
//! The engine calls `accept` synchronously from the dispatching thread; the
//! handle turns that into a non-blocking enqueue and leaves the actual work
//! to a Tokio task driving a [`BatchWriter`].

use std::sync::Arc;

use contracts::{BatchWriter, Measurement};
use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, instrument, warn};

use crate::error::{AdapterError, Result};
use crate::metrics::WorkerMetrics;

/// Handle to a running adapter worker
pub struct AdapterHandle {
    /// Adapter name
    name: String,
    /// Channel to the worker, `None` once shut down
    tx: RwLock<Option<mpsc::Sender<Vec<Measurement>>>>,
    /// Shared metrics
    metrics: Arc<WorkerMetrics>,
    /// Worker task handle
    worker_handle: Mutex<Option<JoinHandle<()>>>,
}

impl AdapterHandle {
    /// Create a new AdapterHandle and spawn the worker task.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn<W: BatchWriter + Send + 'static>(writer: W, queue_capacity: usize) -> Self {
        let name = writer.name().to_string();
        let (tx, rx) = mpsc::channel(queue_capacity.max(1));
        let metrics = Arc::new(WorkerMetrics::new());

        let worker_metrics = Arc::clone(&metrics);
        let worker_name = name.clone();

        let worker_handle = tokio::spawn(async move {
            adapter_worker(writer, rx, worker_metrics, worker_name).await;
        });

        Self {
            name,
            tx: RwLock::new(Some(tx)),
            metrics,
            worker_handle: Mutex::new(Some(worker_handle)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn metrics(&self) -> &Arc<WorkerMetrics> {
        &self.metrics
    }

    /// Enqueue a batch without waiting.
    ///
    /// # Errors
    /// `QueueFull` when the worker is behind (the batch is dropped),
    /// `WorkerClosed` after shutdown.
    pub fn try_send(&self, batch: Vec<Measurement>) -> Result<()> {
        let tx = self.tx.read();
        let Some(tx) = tx.as_ref() else {
            return Err(AdapterError::worker_closed(&self.name));
        };

        match tx.try_send(batch) {
            Ok(()) => {
                self.metrics.queue_depth(tx.max_capacity() - tx.capacity());
                Ok(())
            }
            Err(mpsc::error::TrySendError::Full(batch)) => {
                self.metrics.dropped();
                warn!(
                    adapter = %self.name,
                    measurements = batch.len(),
                    "Queue full, batch dropped"
                );
                Err(AdapterError::queue_full(&self.name))
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                error!(adapter = %self.name, "Adapter worker closed unexpectedly");
                Err(AdapterError::worker_closed(&self.name))
            }
        }
    }

    pub fn is_closed(&self) -> bool {
        self.tx.read().is_none()
    }

    /// Drain the queue, flush and close the writer. Safe to call more than once.
    #[instrument(name = "adapter_handle_shutdown", skip(self), fields(adapter = %self.name))]
    pub async fn shutdown(&self) {
        // Dropping the sender lets the worker finish the backlog and exit
        drop(self.tx.write().take());

        let worker = self.worker_handle.lock().take();
        if let Some(worker) = worker {
            if let Err(e) = worker.await {
                error!(adapter = %self.name, error = ?e, "Worker task panicked");
            }
        }
        debug!(adapter = %self.name, "AdapterHandle shutdown complete");
    }
}

/// Worker task that consumes batches and drives the writer
#[instrument(
    name = "adapter_worker_loop",
    skip(writer, rx, metrics),
    fields(adapter = %name)
)]
async fn adapter_worker<W: BatchWriter>(
    mut writer: W,
    mut rx: mpsc::Receiver<Vec<Measurement>>,
    metrics: Arc<WorkerMetrics>,
    name: String,
) {
    debug!(adapter = %name, "Adapter worker started");

    while let Some(batch) = rx.recv().await {
        metrics.queue_depth(rx.len());

        match writer.write(&batch).await {
            Ok(()) => metrics.written(batch.len()),
            Err(e) => {
                metrics.failed();
                error!(
                    adapter = %name,
                    measurements = batch.len(),
                    error = %e,
                    "Write failed"
                );
            }
        }
    }

    if let Err(e) = writer.flush().await {
        error!(adapter = %name, error = %e, "Flush failed on shutdown");
    }
    if let Err(e) = writer.close().await {
        error!(adapter = %name, error = %e, "Close failed on shutdown");
    }

    debug!(adapter = %name, "Adapter worker stopped");
}
