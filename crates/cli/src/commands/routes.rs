//! `routes` command implementation.

use std::time::Duration;

use adapters::AdapterReport;
use anyhow::{Context, Result};
use routing::{DemandReport, RouteTableSummary, RoutesSummary};
use serde::Serialize;
use tracing::info;

use crate::cli::RoutesArgs;
use crate::pipeline::Pipeline;

/// Route table and demand decisions for JSON output
#[derive(Serialize)]
struct RoutesOutput {
    table: RouteTableSummary,
    demand: DemandReport,
    adapters: Vec<AdapterReport>,
}

/// Execute the `routes` command
pub async fn run_routes(args: &RoutesArgs) -> Result<()> {
    info!(config = %args.config.display(), "Calculating routes");

    let blueprint = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    // Producers are never started, so nothing is dispatched
    let pipeline = Pipeline::build(&blueprint).await?;
    let output = RoutesOutput {
        table: pipeline.engine().route_table().summary(),
        demand: pipeline.engine().last_demand(),
        adapters: pipeline.topology().adapter_reports(),
    };
    pipeline.finish(Duration::ZERO).await;

    if args.json {
        let json =
            serde_json::to_string_pretty(&output).context("Failed to serialize route table")?;
        println!("{}", json);
    } else {
        print_routes(&output);
    }

    Ok(())
}

fn print_routes(output: &RoutesOutput) {
    println!("\n=== Route Table (generation {}) ===", output.table.generation);

    print_role("Processors", &output.table.processors);
    print_role("Sinks", &output.table.sinks);

    println!("\nAdapters:");
    for adapter in &output.adapters {
        let state = if adapter.enabled { "enabled" } else { "disabled" };
        let mode = if adapter.auto_start { "auto" } else { "on demand" };
        println!("  - {} ({}, {}, {})", adapter.name, adapter.role, mode, state);
        if let Some(keys) = &adapter.requested_inputs {
            println!("      requested inputs: {}", join_or_none(keys));
        }
        if let Some(keys) = &adapter.requested_outputs {
            println!("      requested outputs: {}", join_or_none(keys));
        }
    }

    let demand = &output.demand;
    println!(
        "\nDemand: {} keys provided, {} keys demanded",
        demand.provided_keys, demand.demanded_keys
    );
    if !demand.enabled.is_empty() {
        println!("  enabled: {}", demand.enabled.join(", "));
    }
    if !demand.disabled.is_empty() {
        println!("  disabled: {}", demand.disabled.join(", "));
    }
    println!();
}

fn print_role(title: &str, routes: &RoutesSummary) {
    println!("\n{}:", title);
    if routes.routes.is_empty() && routes.broadcast.is_empty() {
        println!("  (none)");
        return;
    }
    for route in &routes.routes {
        println!("  {} -> {}", route.key, route.adapters.join(", "));
    }
    if !routes.broadcast.is_empty() {
        println!("  * -> {}", routes.broadcast.join(", "));
    }
}

fn join_or_none(keys: &[String]) -> String {
    if keys.is_empty() {
        "(none)".to_string()
    } else {
        keys.join(", ")
    }
}
