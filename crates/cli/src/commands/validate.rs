//! `validate` command implementation.

use anyhow::{Context, Result};
use config_loader::{ConfigLoader, RouterBlueprint};
use contracts::KeySet;
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;

/// Outcome of loading one topology file
#[derive(Serialize)]
struct ValidationReport {
    config: String,
    valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    topology: Option<TopologyOverview>,
}

#[derive(Serialize)]
struct TopologyOverview {
    version: String,
    dispatch_mode: String,
    producers: usize,
    processors: usize,
    sinks: usize,
    provided_keys: Vec<String>,
    demanded_keys: Vec<String>,
}

impl ValidationReport {
    fn rejected(config: String, error: String) -> Self {
        Self {
            config,
            valid: false,
            error: Some(error),
            warnings: Vec::new(),
            topology: None,
        }
    }

    fn accepted(config: String, blueprint: &RouterBlueprint) -> Self {
        Self {
            config,
            valid: true,
            error: None,
            warnings: topology_warnings(blueprint),
            topology: Some(TopologyOverview::of(blueprint)),
        }
    }
}

impl TopologyOverview {
    fn of(blueprint: &RouterBlueprint) -> Self {
        let names =
            |keys: KeySet| -> Vec<String> { keys.iter().map(ToString::to_string).collect() };
        Self {
            version: format!("{:?}", blueprint.version),
            dispatch_mode: format!("{:?}", blueprint.engine.dispatch_mode),
            producers: blueprint.producers.len(),
            processors: blueprint.processors.len(),
            sinks: blueprint.sinks.len(),
            provided_keys: names(blueprint.provided_keys()),
            demanded_keys: names(blueprint.demanded_keys()),
        }
    }
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let config = args.config.display().to_string();
    let report = match ConfigLoader::load_from_path(&args.config) {
        Ok(blueprint) => ValidationReport::accepted(config, &blueprint),
        Err(e) => ValidationReport::rejected(config, e.to_string()),
    };

    if args.json {
        let json = serde_json::to_string_pretty(&report)
            .context("Failed to serialize validation report")?;
        println!("{json}");
    } else {
        print_report(&report);
    }

    anyhow::ensure!(report.valid, "Configuration validation failed");
    Ok(())
}

/// Loader warnings plus the ones that only matter when running the topology
fn topology_warnings(blueprint: &RouterBlueprint) -> Vec<String> {
    let mut warnings: Vec<String> = ConfigLoader::warnings(blueprint)
        .iter()
        .map(ToString::to_string)
        .collect();

    if blueprint.producers.is_empty() {
        warnings.push("no producers configured, nothing will be routed".to_string());
    }
    if blueprint.sinks.is_empty() {
        warnings.push("no sinks configured, measurements end at the processors".to_string());
    }
    warnings
}

fn print_report(report: &ValidationReport) {
    let Some(topology) = &report.topology else {
        println!("✗ {} is invalid", report.config);
        if let Some(error) = &report.error {
            println!("  {error}");
        }
        return;
    };

    println!("✓ {} is valid", report.config);
    println!("\n  {} / {} dispatch", topology.version, topology.dispatch_mode);
    println!(
        "  {} producers, {} processors, {} sinks",
        topology.producers, topology.processors, topology.sinks
    );
    println!("  Provided: {}", topology.provided_keys.join(", "));
    println!("  Demanded: {}", topology.demanded_keys.join(", "));

    if !report.warnings.is_empty() {
        println!("\n⚠ Warnings:");
        for warning in &report.warnings {
            println!("  - {warning}");
        }
    }
}
