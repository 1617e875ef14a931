//! Demand propagation
//!
//! Runs after every published calculation and drives demand-driven
//! (`auto_start == false`) adapters:
//!
//! - Pass A matches input interest against what is currently provided.
//!   Sinks are governed by this pass alone.
//! - Pass B matches output capability against what is currently demanded.
//!   Producers are governed by this pass alone.
//! - Processors stay enabled while either side has live demand.
//!
//! Both key universes are computed from the state at the start of the pass.
//! Adapters whose declared keys change as a consequence of being enabled are
//! picked up by the next calculation, not by this one.

use std::sync::Arc;

use contracts::{
    has_demand, intersect, same_demand, Adapter, AdapterRole, InputAdapter, KeySet, OutputAdapter,
    Processor, Producer, Sink,
};
use observability::record_adapter_state_change;
use serde::Serialize;
use tracing::{debug, instrument};

use crate::registry::Registries;

/// What one propagation changed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DemandReport {
    /// Distinct keys produced by producers and processors
    pub provided_keys: usize,
    /// Distinct keys consumed by processors and sinks
    pub demanded_keys: usize,
    /// Adapters switched on
    pub enabled: Vec<String>,
    /// Adapters switched off
    pub disabled: Vec<String>,
    /// Adapters whose requested input or output keys were rewritten
    pub resubscribed: Vec<String>,
}

impl DemandReport {
    pub fn is_unchanged(&self) -> bool {
        self.enabled.is_empty() && self.disabled.is_empty() && self.resubscribed.is_empty()
    }

    fn set_enabled<A: ?Sized + Adapter>(&mut self, adapter: &A, role: AdapterRole, enabled: bool) {
        if adapter.is_enabled() == enabled {
            return;
        }
        adapter.set_enabled(enabled);
        record_adapter_state_change(role, enabled);
        debug!(adapter = adapter.name(), role = %role, enabled, "Demand changed adapter state");

        let name = adapter.name().to_string();
        if enabled {
            self.disabled.retain(|n| n != &name);
            self.enabled.push(name);
        } else {
            self.enabled.retain(|n| n != &name);
            self.disabled.push(name);
        }
    }

    fn resubscribed<A: ?Sized + Adapter>(&mut self, adapter: &A) {
        let name = adapter.name();
        if !self.resubscribed.iter().any(|n| n == name) {
            self.resubscribed.push(name.to_string());
        }
    }
}

/// Enable/disable demand-driven adapters and sync their requested keys
#[instrument(name = "propagate_demand", skip(registries))]
pub fn propagate_demand(registries: &Registries) -> DemandReport {
    let producers = registries.producers.snapshot();
    let processors = registries.processors.snapshot();
    let sinks = registries.sinks.snapshot();

    let mut report = DemandReport::default();
    propagate_supply(&producers, &processors, &sinks, &mut report);
    propagate_interest(&producers, &processors, &sinks, &mut report);

    if !report.is_unchanged() {
        debug!(
            enabled = report.enabled.len(),
            disabled = report.disabled.len(),
            resubscribed = report.resubscribed.len(),
            "Demand propagated"
        );
    }
    report
}

/// Pass A: input side against provided keys
fn propagate_supply(
    producers: &[Arc<dyn Producer>],
    processors: &[Arc<dyn Processor>],
    sinks: &[Arc<dyn Sink>],
    report: &mut DemandReport,
) {
    let provided: KeySet = producers
        .iter()
        .filter_map(|p| p.output_keys())
        .chain(processors.iter().filter_map(|p| p.output_keys()))
        .flatten()
        .collect();
    report.provided_keys = provided.len();

    let on_demand_processors = processors.iter().filter(|p| !p.auto_start());
    let on_demand_sinks = sinks.iter().filter(|s| !s.auto_start());

    if provided.is_empty() {
        for processor in on_demand_processors {
            clear_requested_inputs(processor.as_ref(), report);
        }
        for sink in on_demand_sinks {
            clear_requested_inputs(sink.as_ref(), report);
            report.set_enabled(sink.as_ref(), AdapterRole::Sink, false);
        }
        return;
    }

    for processor in on_demand_processors {
        let want = request_inputs(processor.as_ref(), &provided, report);
        if has_demand(Some(&want)) {
            report.set_enabled(processor.as_ref(), AdapterRole::Processor, true);
        }
    }

    for sink in on_demand_sinks {
        let want = request_inputs(sink.as_ref(), &provided, report);
        report.set_enabled(sink.as_ref(), AdapterRole::Sink, has_demand(Some(&want)));
    }
}

/// Pass B: output side against demanded keys
fn propagate_interest(
    producers: &[Arc<dyn Producer>],
    processors: &[Arc<dyn Processor>],
    sinks: &[Arc<dyn Sink>],
    report: &mut DemandReport,
) {
    let demanded: KeySet = sinks
        .iter()
        .filter_map(|s| s.input_keys())
        .chain(processors.iter().filter_map(|p| p.input_keys()))
        .flatten()
        .collect();
    report.demanded_keys = demanded.len();

    let on_demand_processors = processors.iter().filter(|p| !p.auto_start());
    let on_demand_producers = producers.iter().filter(|p| !p.auto_start());

    if demanded.is_empty() {
        for processor in on_demand_processors {
            clear_requested_outputs(processor.as_ref(), report);
            if !has_demand(processor.requested_input_keys().as_ref()) {
                report.set_enabled(processor.as_ref(), AdapterRole::Processor, false);
            }
        }
        for producer in on_demand_producers {
            clear_requested_outputs(producer.as_ref(), report);
            report.set_enabled(producer.as_ref(), AdapterRole::Producer, false);
        }
        return;
    }

    for processor in on_demand_processors {
        let offer = request_outputs(processor.as_ref(), &demanded, report);
        let enabled =
            has_demand(Some(&offer)) || has_demand(processor.requested_input_keys().as_ref());
        report.set_enabled(processor.as_ref(), AdapterRole::Processor, enabled);
    }

    for producer in on_demand_producers {
        let offer = request_outputs(producer.as_ref(), &demanded, report);
        report.set_enabled(producer.as_ref(), AdapterRole::Producer, has_demand(Some(&offer)));
    }
}

fn request_inputs<A: ?Sized + InputAdapter>(
    adapter: &A,
    provided: &KeySet,
    report: &mut DemandReport,
) -> KeySet {
    let want = intersect(adapter.input_keys().as_ref(), provided);
    if !same_demand(adapter.requested_input_keys().as_ref(), Some(&want)) {
        adapter.set_requested_input_keys(Some(want.clone()));
        report.resubscribed(adapter);
    }
    want
}

fn request_outputs<A: ?Sized + OutputAdapter>(
    adapter: &A,
    demanded: &KeySet,
    report: &mut DemandReport,
) -> KeySet {
    let offer = intersect(adapter.output_keys().as_ref(), demanded);
    if !same_demand(adapter.requested_output_keys().as_ref(), Some(&offer)) {
        adapter.set_requested_output_keys(Some(offer.clone()));
        report.resubscribed(adapter);
    }
    offer
}

fn clear_requested_inputs<A: ?Sized + InputAdapter>(adapter: &A, report: &mut DemandReport) {
    if adapter.requested_input_keys().is_some() {
        adapter.set_requested_input_keys(None);
        report.resubscribed(adapter);
    }
}

fn clear_requested_outputs<A: ?Sized + OutputAdapter>(adapter: &A, report: &mut DemandReport) {
    if adapter.requested_output_keys().is_some() {
        adapter.set_requested_output_keys(None);
        report.resubscribed(adapter);
    }
}
