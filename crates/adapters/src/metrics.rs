//! Per-worker counters, updated from the enqueueing thread and the worker task

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering::Relaxed};

use serde::Serialize;

/// Live counters of one adapter worker
#[derive(Debug, Default)]
pub struct WorkerMetrics {
    queue_len: AtomicUsize,
    peak_queue_len: AtomicUsize,
    batches: AtomicU64,
    measurements: AtomicU64,
    failed: AtomicU64,
    dropped: AtomicU64,
}

impl WorkerMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue depth changed, tracking the high-water mark
    pub fn queue_depth(&self, len: usize) {
        self.queue_len.store(len, Relaxed);
        self.peak_queue_len.fetch_max(len, Relaxed);
    }

    pub fn written(&self, measurements: usize) {
        self.batches.fetch_add(1, Relaxed);
        self.measurements.fetch_add(measurements as u64, Relaxed);
    }

    pub fn failed(&self) {
        self.failed.fetch_add(1, Relaxed);
    }

    /// A batch was refused because the queue was full
    pub fn dropped(&self) {
        self.dropped.fetch_add(1, Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            queue_len: self.queue_len.load(Relaxed),
            peak_queue_len: self.peak_queue_len.load(Relaxed),
            batches: self.batches.load(Relaxed),
            measurements: self.measurements.load(Relaxed),
            failed: self.failed.load(Relaxed),
            dropped: self.dropped.load(Relaxed),
        }
    }
}

/// Point-in-time copy of [`WorkerMetrics`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub queue_len: usize,
    pub peak_queue_len: usize,
    /// Batches written successfully
    pub batches: u64,
    pub measurements: u64,
    /// Batches the writer rejected
    pub failed: u64,
    pub dropped: u64,
}
