//! Configuration validation
//!
//! Rules:
//! - adapter names are non-empty and unique across all roles
//! - frequency_hz > 0
//! - queue_capacity > 0
//! - readiness timeouts > 0
//! - a processor never receives its own outputs (no self-feedback)
//!
//! Warnings are reported separately and never fail a load.

use std::collections::HashSet;
use std::fmt;

use contracts::{ContractError, DispatchMode, KeySet, RouterBlueprint};

/// Validate a RouterBlueprint
///
/// Returns the first error encountered, or Ok(()).
pub fn validate(blueprint: &RouterBlueprint) -> Result<(), ContractError> {
    validate_engine(blueprint)?;
    validate_names(blueprint)?;
    validate_producers(blueprint)?;
    validate_processors(blueprint)?;
    validate_sinks(blueprint)?;
    Ok(())
}

fn validate_engine(blueprint: &RouterBlueprint) -> Result<(), ContractError> {
    let engine = &blueprint.engine;
    if engine.readiness_timeout_ms == 0 {
        return Err(ContractError::config_validation(
            "engine.readiness_timeout_ms",
            "readiness_timeout_ms must be > 0",
        ));
    }
    if engine.shutdown_timeout_ms == 0 {
        return Err(ContractError::config_validation(
            "engine.shutdown_timeout_ms",
            "shutdown_timeout_ms must be > 0",
        ));
    }
    Ok(())
}

/// Adapter names unique across producers, processors and sinks
fn validate_names(blueprint: &RouterBlueprint) -> Result<(), ContractError> {
    let mut seen = HashSet::new();
    for (idx, name) in blueprint.adapter_names().enumerate() {
        if name.trim().is_empty() {
            return Err(ContractError::config_validation(
                format!("adapters[{idx}].name"),
                "adapter name cannot be empty",
            ));
        }
        if !seen.insert(name) {
            return Err(ContractError::config_validation(
                format!("adapters[name={name}]"),
                "duplicate adapter name",
            ));
        }
    }
    Ok(())
}

fn validate_readiness(field: String, timeout_ms: Option<u64>) -> Result<(), ContractError> {
    if timeout_ms == Some(0) {
        return Err(ContractError::config_validation(
            field,
            "readiness_timeout_ms must be > 0",
        ));
    }
    Ok(())
}

fn validate_queue(field: String, capacity: usize) -> Result<(), ContractError> {
    if capacity == 0 {
        return Err(ContractError::config_validation(
            field,
            "queue_capacity must be > 0",
        ));
    }
    Ok(())
}

fn validate_producers(blueprint: &RouterBlueprint) -> Result<(), ContractError> {
    for producer in &blueprint.producers {
        if !(producer.frequency_hz.is_finite() && producer.frequency_hz > 0.0) {
            return Err(ContractError::config_validation(
                format!("producers[{}].frequency_hz", producer.name),
                format!("frequency_hz must be > 0, got {}", producer.frequency_hz),
            ));
        }
        validate_readiness(
            format!("producers[{}].readiness_timeout_ms", producer.name),
            producer.readiness_timeout_ms,
        )?;
    }
    Ok(())
}

fn validate_processors(blueprint: &RouterBlueprint) -> Result<(), ContractError> {
    let broadcast = blueprint.engine.dispatch_mode == DispatchMode::Broadcast;

    for processor in &blueprint.processors {
        validate_queue(
            format!("processors[{}].queue_capacity", processor.name),
            processor.queue_capacity,
        )?;
        validate_readiness(
            format!("processors[{}].readiness_timeout_ms", processor.name),
            processor.readiness_timeout_ms,
        )?;

        if processor.outputs.is_empty() {
            continue;
        }

        // Anything that receives every measurement would receive its own outputs
        if broadcast {
            return Err(ContractError::config_validation(
                format!("processors[{}].outputs", processor.name),
                "processors cannot emit outputs in broadcast dispatch mode",
            ));
        }
        let Some(inputs) = &processor.inputs else {
            return Err(ContractError::config_validation(
                format!("processors[{}].inputs", processor.name),
                "a processor declaring outputs must declare its inputs",
            ));
        };
        if let Some(key) = processor.outputs.iter().find(|k| inputs.contains(*k)) {
            return Err(ContractError::config_validation(
                format!("processors[{}].outputs", processor.name),
                format!("output key {key} is also one of its inputs"),
            ));
        }
    }
    Ok(())
}

fn validate_sinks(blueprint: &RouterBlueprint) -> Result<(), ContractError> {
    for sink in &blueprint.sinks {
        validate_queue(
            format!("sinks[{}].queue_capacity", sink.name),
            sink.queue_capacity,
        )?;
        validate_readiness(
            format!("sinks[{}].readiness_timeout_ms", sink.name),
            sink.readiness_timeout_ms,
        )?;
    }
    Ok(())
}

/// Non-fatal topology finding
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigWarning {
    /// Input keys no producer or processor provides
    UnprovidedInputs { adapter: String, keys: Vec<String> },
    /// Producer output keys nothing consumes
    UnconsumedOutputs { adapter: String, keys: Vec<String> },
}

impl fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnprovidedInputs { adapter, keys } => {
                write!(f, "'{adapter}' consumes keys nobody provides: {}", keys.join(", "))
            }
            Self::UnconsumedOutputs { adapter, keys } => {
                write!(f, "'{adapter}' provides keys nobody consumes: {}", keys.join(", "))
            }
        }
    }
}

/// Collect topology warnings for a valid blueprint
pub fn warnings(blueprint: &RouterBlueprint) -> Vec<ConfigWarning> {
    let provided = blueprint.provided_keys();
    let demanded = blueprint.demanded_keys();
    // Any consumer without declared inputs takes everything
    let takes_everything = blueprint.processors.iter().any(|p| p.inputs.is_none())
        || blueprint.sinks.iter().any(|s| s.inputs.is_none());

    let mut found = Vec::new();

    for sink in &blueprint.sinks {
        let Some(inputs) = &sink.inputs else {
            continue;
        };
        let missing = missing_from(inputs.iter(), &provided);
        if !missing.is_empty() {
            found.push(ConfigWarning::UnprovidedInputs {
                adapter: sink.name.clone(),
                keys: missing,
            });
        }
    }

    if !takes_everything {
        for producer in &blueprint.producers {
            let unused = missing_from(producer.outputs.iter(), &demanded);
            if !unused.is_empty() {
                found.push(ConfigWarning::UnconsumedOutputs {
                    adapter: producer.name.clone(),
                    keys: unused,
                });
            }
        }
    }

    found
}

fn missing_from<'a>(
    keys: impl Iterator<Item = &'a contracts::MeasurementKey>,
    universe: &KeySet,
) -> Vec<String> {
    keys.filter(|k| !universe.contains(*k))
        .map(|k| k.to_string())
        .collect()
}
