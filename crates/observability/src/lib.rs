//! # Observability
//!
//! Logging and Prometheus metrics for the measurement router.
//!
//! Tracing goes to stdout in one of three [`LogFormat`]s, filtered by
//! `RUST_LOG` with a fallback level. The Prometheus exporter is optional and
//! can be installed later than tracing, once the process knows it will run
//! long enough to be scraped.
//!
//! ```ignore
//! observability::init_with_config(ObservabilityConfig::default().with_level("debug"))?;
//!
//! let started = Instant::now();
//! let calculation = calculate_routes(&registries, timeout, generation);
//! observability::record_calculation(true, started.elapsed(), &calculation.table.shape());
//! ```

pub mod metrics;

use anyhow::{Context, Result};
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

pub use crate::metrics::{
    record_adapter_state_change, record_calculation, record_delivery_failure, record_dispatch,
    record_readiness_timeout, CalculationAggregator, CalculationSummary, RunningStats,
    StatsSummary, TableShape,
};

/// What to install at startup
#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    pub log_format: LogFormat,
    /// Prometheus listener port, `None` leaves metrics unexported
    pub metrics_port: Option<u16>,
    /// Filter used when `RUST_LOG` is unset
    pub default_log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_format: LogFormat::Compact,
            metrics_port: None,
            default_log_level: "info".to_string(),
        }
    }
}

impl ObservabilityConfig {
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.log_format = format;
        self
    }

    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.default_log_level = level.into();
        self
    }

    pub fn with_metrics_port(mut self, port: u16) -> Self {
        self.metrics_port = Some(port);
        self
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per event, with thread and source location
    Json,
    /// Multi-line, human-readable
    Pretty,
    /// One line per event
    #[default]
    Compact,
}

/// Install the tracing subscriber and, if configured, the metrics exporter.
///
/// # Errors
/// A global subscriber or recorder is already installed, or the metrics port
/// cannot be bound.
pub fn init_with_config(config: ObservabilityConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.default_log_level));

    let output = match config.log_format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_thread_names(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        LogFormat::Pretty => fmt::layer().pretty().boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(false).boxed(),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(output)
        .try_init()
        .context("tracing subscriber already installed")?;

    if let Some(port) = config.metrics_port {
        serve_metrics(port)?;
    }

    tracing::debug!(
        log_format = ?config.log_format,
        level = %config.default_log_level,
        "Logging initialized"
    );
    Ok(())
}

/// Install the Prometheus recorder with an HTTP listener on `port`
pub fn serve_metrics(port: u16) -> Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], port))
        .install()
        .with_context(|| format!("cannot serve metrics on port {port}"))?;

    tracing::info!(port, "Prometheus endpoint listening");
    Ok(())
}
