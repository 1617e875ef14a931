//! Pipeline orchestrator - wires the engine to a topology and runs it.

use std::future::Future;
use std::time::{Duration, Instant};

use adapters::{AdapterFactory, Topology};
use anyhow::{Context, Result};
use contracts::RouterBlueprint;
use routing::RoutingEngine;
use tracing::{info, warn};

use super::PipelineStats;

/// Upper bound for the first route calculation before producers start
const SETTLE_TIMEOUT: Duration = Duration::from_secs(10);

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Topology to build
    pub blueprint: RouterBlueprint,

    /// Run duration (None = until the shutdown signal)
    pub duration: Option<Duration>,

    /// Metrics server port (None = disabled)
    pub metrics_port: Option<u16>,
}

/// Engine plus the adapters registered with it
pub struct Pipeline {
    engine: RoutingEngine,
    topology: Topology,
    shutdown_timeout: Duration,
}

impl Pipeline {
    /// Create the engine and build every adapter.
    ///
    /// Waits for the resulting route calculation, so the returned pipeline
    /// already has a table and demand-driven adapters in their initial state.
    pub async fn build(blueprint: &RouterBlueprint) -> Result<Self> {
        let engine = RoutingEngine::new(blueprint.engine.clone());
        let topology = AdapterFactory::build(blueprint, &engine)
            .await
            .context("Failed to build adapter topology")?;

        let settled = tokio::task::block_in_place(|| engine.wait_for_idle(SETTLE_TIMEOUT));
        if !settled {
            warn!(
                timeout_secs = SETTLE_TIMEOUT.as_secs(),
                "Route calculation still running, continuing with the current table"
            );
        }

        info!(
            adapters = topology.len(),
            generation = engine.route_table().generation(),
            "Pipeline built"
        );

        Ok(Self {
            engine,
            topology,
            shutdown_timeout: blueprint.engine.shutdown_timeout(),
        })
    }

    pub fn engine(&self) -> &RoutingEngine {
        &self.engine
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    /// Run producers until `config.duration` elapses or `shutdown` resolves
    pub async fn run(
        config: PipelineConfig,
        shutdown: impl Future<Output = ()>,
    ) -> Result<PipelineStats> {
        if let Some(port) = config.metrics_port {
            observability::serve_metrics(port)?;
            info!("Metrics endpoint available on port {}", port);
        }

        let pipeline = Self::build(&config.blueprint).await?;
        let start_time = Instant::now();

        pipeline
            .topology
            .start_producers(pipeline.engine.publisher());

        let deadline = async {
            match config.duration {
                Some(duration) => tokio::time::sleep(duration).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            _ = deadline => {
                info!("Run duration elapsed, stopping");
            }
            _ = shutdown => {
                warn!("Received shutdown signal, stopping pipeline...");
            }
        }

        let duration = start_time.elapsed();
        Ok(pipeline.finish(duration).await)
    }

    /// Drain adapters, shut the engine down and collect statistics
    pub async fn finish(self, duration: Duration) -> PipelineStats {
        // Processors may still publish while draining, so the engine goes last
        self.topology.shutdown().await;

        let drained =
            tokio::task::block_in_place(|| self.engine.shutdown(self.shutdown_timeout));
        if !drained {
            warn!("Route calculation did not finish before shutdown timeout");
        }

        PipelineStats {
            duration,
            engine: self.engine.stats(),
            calculations: self.engine.calculation_summary(),
            adapters: self.topology.adapter_reports(),
        }
    }
}
