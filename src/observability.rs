//! Observability module for centralized metrics and logging setup.
//!
//! This module provides:
//! - Structured logging with configurable levels (pretty or JSON)
//! - Metrics collection with an optional Prometheus snapshot written after a run
//! - Recording helpers for catalog, conversion and batch metrics

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing_subscriber::prelude::*;

use crate::conversion::ConversionSource;
use crate::errors::{error_logging, AppError, AppResult};
use crate::observability_config::ObservabilityConfig;

/// Initialize logging and, when a snapshot path is configured, the metrics recorder
pub fn init_observability_with_config(config: &ObservabilityConfig) -> Result<Option<PrometheusHandle>> {
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid observability configuration: {}", e))?;

    init_tracing_with_config(config)?;

    let handle = match &config.metrics_output_path {
        Some(_) => Some(init_metrics()?),
        None => None,
    };

    tracing::info!(
        environment = %config.environment,
        metrics_output = ?config.metrics_output_path,
        "Observability initialized"
    );
    Ok(handle)
}

/// Initialize structured logging with tracing and configuration
pub fn init_tracing_with_config(config: &ObservabilityConfig) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(format!("invoice_kilos={}", config.log_level.to_lowercase()).parse()?);

    // Pretty for development, JSON for everything else
    let initialized = if config.use_pretty_logs() {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .pretty()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_thread_names(false),
            )
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_thread_names(true),
            )
            .try_init()
    };

    if let Err(e) = initialized {
        // A subscriber installed by an embedding caller keeps precedence
        tracing::debug!("Tracing subscriber already set: {}", e);
        return Ok(());
    }

    tracing::info!(
        environment = %config.environment,
        log_level = %config.log_level,
        "Tracing initialized with structured logging"
    );
    Ok(())
}

/// Install the Prometheus recorder
pub fn init_metrics() -> Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    tracing::info!("Metrics collection initialized");
    Ok(handle)
}

/// Render the current metrics in Prometheus text format to a file
pub fn write_metrics_snapshot(handle: &PrometheusHandle, path: &Path) -> AppResult<()> {
    fs::write(path, handle.render()).map_err(|e| {
        let error = AppError::FileSystem(format!(
            "Failed to write metrics snapshot to '{}': {}",
            path.display(),
            e
        ));
        error_logging::log_filesystem_error(
            &error,
            "write_metrics_snapshot",
            Some(&path.display().to_string()),
            None,
        );
        error
    })?;
    tracing::debug!(path = %path.display(), "Metrics snapshot written");
    Ok(())
}

/// Record catalog size after a reload
pub fn record_catalog_metrics(entries: usize, overrides: usize) {
    metrics::gauge!("catalog_entries").set(entries as f64);
    metrics::gauge!("catalog_overrides").set(overrides as f64);
}

/// Record one line conversion
pub fn record_conversion_metrics(source: ConversionSource, duration: Duration) {
    metrics::counter!("conversions_total", "source" => source.as_str()).increment(1);
    metrics::histogram!("conversion_duration_seconds").record(duration.as_secs_f64());
}

/// Record one batch
pub fn record_batch_metrics(lines: usize, unmatched: usize, duration: Duration) {
    metrics::counter!("batch_lines_total").increment(lines as u64);
    metrics::counter!("batch_unmatched_lines_total").increment(unmatched as u64);
    metrics::histogram!("batch_duration_seconds").record(duration.as_secs_f64());

    // Share of lines left without a conversion factor
    let unmatched_ratio = if lines > 0 {
        unmatched as f64 / lines as f64
    } else {
        0.0
    };
    metrics::histogram!("batch_unmatched_ratio").record(unmatched_ratio);
}
