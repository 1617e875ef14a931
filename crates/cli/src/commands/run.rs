//! `run` command implementation.

use anyhow::{Context, Result};
use std::time::Duration;
use tracing::{info, warn};

use crate::cli::RunArgs;
use crate::pipeline::{Pipeline, PipelineConfig};

/// Execute the `run` command
pub async fn run_pipeline(args: &RunArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration");

    if !args.config.exists() {
        anyhow::bail!("Configuration file not found: {}", args.config.display());
    }

    let blueprint = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    for warning in config_loader::ConfigLoader::warnings(&blueprint) {
        warn!(%warning, "Configuration warning");
    }

    info!(
        producers = blueprint.producers.len(),
        processors = blueprint.processors.len(),
        sinks = blueprint.sinks.len(),
        dispatch_mode = ?blueprint.engine.dispatch_mode,
        "Configuration loaded"
    );

    let pipeline_config = PipelineConfig {
        blueprint,
        duration: (args.duration_secs > 0).then(|| Duration::from_secs(args.duration_secs)),
        metrics_port: (args.metrics_port > 0).then_some(args.metrics_port),
    };

    info!("Starting pipeline...");

    let stats = Pipeline::run(pipeline_config, shutdown_signal())
        .await
        .context("Pipeline execution failed")?;

    info!(
        measurements = stats.engine.measurements,
        deliveries = stats.engine.deliveries,
        duration_secs = stats.duration.as_secs_f64(),
        throughput = format!("{:.1}", stats.throughput()),
        "Pipeline completed"
    );

    if args.json {
        let json =
            serde_json::to_string_pretty(&stats).context("Failed to serialize run statistics")?;
        println!("{}", json);
    } else {
        stats.print_summary();
    }

    info!("Measurement router finished");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM.
///
/// A handler that cannot be installed never fires.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
