//! Dispatcher - fan-out of measurement batches to processors and sinks
//!
//! Routed delivery scans the batch once against a table snapshot, grouping
//! measurements per destination slot, then hands each adapter a single batch.
//! Broadcast delivery skips the table and sends the whole batch everywhere.
//!
//! Each `accept` is isolated: an error or a panic from one adapter is logged
//! and counted, and delivery to the remaining adapters continues.

use std::panic::{self, AssertUnwindSafe};

use contracts::{InputAdapter, Measurement};
use observability::record_delivery_failure;
use tracing::error;

use crate::error::panic_message;
use crate::registry::Registries;
use crate::stats::DispatchSummary;
use crate::table::{RouteTable, Routes};

/// Deliver `batch` through the route table
pub fn dispatch_routed(table: &RouteTable, batch: &[Measurement]) -> DispatchSummary {
    let mut summary = DispatchSummary {
        measurements: batch.len(),
        ..Default::default()
    };
    if batch.is_empty() {
        return summary;
    }

    let processor_groups = group_by_slot(table.processors(), batch);
    let sink_groups = group_by_slot(table.sinks(), batch);

    deliver_routes(table.processors(), batch, processor_groups, &mut summary);
    deliver_routes(table.sinks(), batch, sink_groups, &mut summary);
    summary
}

/// Deliver `batch` unfiltered to every registered processor and sink
pub fn dispatch_broadcast(registries: &Registries, batch: &[Measurement]) -> DispatchSummary {
    let mut summary = DispatchSummary {
        measurements: batch.len(),
        ..Default::default()
    };
    if batch.is_empty() {
        return summary;
    }

    for processor in registries.processors.snapshot() {
        deliver(processor.as_ref(), batch, &mut summary);
    }
    for sink in registries.sinks.snapshot() {
        deliver(sink.as_ref(), batch, &mut summary);
    }
    summary
}

fn group_by_slot<T: ?Sized + InputAdapter>(
    routes: &Routes<T>,
    batch: &[Measurement],
) -> Vec<Vec<Measurement>> {
    let mut groups = vec![Vec::new(); routes.slot_count()];
    for measurement in batch {
        for &slot in routes.slots_for(&measurement.key) {
            groups[slot].push(measurement.clone());
        }
    }
    groups
}

fn deliver_routes<T: ?Sized + InputAdapter>(
    routes: &Routes<T>,
    batch: &[Measurement],
    groups: Vec<Vec<Measurement>>,
    summary: &mut DispatchSummary,
) {
    for &slot in routes.broadcast_slots() {
        deliver(routes.adapter(slot).as_ref(), batch, summary);
    }

    for (slot, group) in groups.into_iter().enumerate() {
        if !group.is_empty() {
            deliver(routes.adapter(slot).as_ref(), &group, summary);
        }
    }
}

fn deliver<T: ?Sized + InputAdapter>(
    adapter: &T,
    batch: &[Measurement],
    summary: &mut DispatchSummary,
) {
    if !adapter.is_enabled() {
        summary.skipped_disabled += 1;
        return;
    }

    let message = match panic::catch_unwind(AssertUnwindSafe(|| adapter.accept(batch))) {
        Ok(Ok(())) => {
            summary.deliveries += 1;
            return;
        }
        Ok(Err(e)) => e.to_string(),
        Err(payload) => format!("panicked: {}", panic_message(payload.as_ref())),
    };

    summary.failures += 1;
    record_delivery_failure(adapter.name());
    error!(
        adapter = adapter.name(),
        measurements = batch.len(),
        error = %message,
        "Delivery failed"
    );
}
