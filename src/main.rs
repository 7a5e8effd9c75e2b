use anyhow::{Context, Result};
use invoice_kilos::catalog::{Catalog, ConversionStore, JsonFileConversionStore};
use invoice_kilos::config::AppConfig;
use invoice_kilos::conversion::{format_decimal, BatchReport, ConversionEngine, InvoiceLine};
use invoice_kilos::errors::error_logging;
use invoice_kilos::observability;
use serde::Serialize;
use std::env;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// One exported row, decimals already formatted for the accounting import
#[derive(Debug, Serialize)]
struct OutputRow<'a> {
    raw_name: &'a str,
    unit_code: Option<&'a str>,
    quantity: String,
    kilograms: String,
    unit_of_measure: &'a str,
    unit_price: Option<String>,
    factor_used: String,
    source: &'static str,
    formula: &'a str,
}

fn output_rows(report: &BatchReport) -> Vec<OutputRow<'_>> {
    report
        .lines
        .iter()
        .map(|converted| OutputRow {
            raw_name: &converted.line.raw_name,
            unit_code: converted.line.unit_code.as_deref(),
            quantity: format_decimal(converted.line.quantity, 5),
            kilograms: format_decimal(converted.result.kilograms, 5),
            unit_of_measure: &converted.unit_of_measure,
            unit_price: converted.unit_price.map(|price| format_decimal(price, 5)),
            factor_used: format_decimal(converted.result.factor_used, 5),
            source: converted.result.source.as_str(),
            formula: &converted.result.formula,
        })
        .collect()
}

fn parse_args() -> Result<(PathBuf, Option<PathBuf>)> {
    let mut args = env::args().skip(1);
    let input = args
        .next()
        .map(PathBuf::from)
        .ok_or_else(|| anyhow::anyhow!("Usage: invoice-kilos <lines.json> [output.json]"))?;
    Ok((input, args.next().map(PathBuf::from)))
}

fn main() -> Result<()> {
    // Load environment variables from .env file first
    dotenvy::dotenv().ok();

    let config = AppConfig::from_env()?;
    let metrics_handle = observability::init_observability_with_config(&config.observability)?;

    if let Err(e) = config.validate() {
        error_logging::log_config_error(&e, "AppConfig", "validate");
        return Err(e.into());
    }
    info!("{}", config.summary());

    let (input_path, output_path) = parse_args()?;

    // Fresh catalog snapshot for this batch
    let store = config
        .catalog
        .overrides_path
        .as_ref()
        .map(|path| JsonFileConversionStore::new(path.clone()));
    let catalog = Catalog::reload(store.as_ref().map(|s| s as &dyn ConversionStore));

    let raw = fs::read_to_string(&input_path)
        .with_context(|| format!("Failed to read invoice lines from {}", input_path.display()))?;
    let lines: Vec<InvoiceLine> = serde_json::from_str(&raw)
        .with_context(|| format!("Invalid invoice lines JSON in {}", input_path.display()))?;

    info!(
        lines = lines.len(),
        catalog_entries = catalog.len(),
        input = %input_path.display(),
        "Converting invoice lines"
    );

    let engine = ConversionEngine::new(Arc::new(catalog), config.engine);
    let report = engine.convert_batch_parallel(&lines);

    if report.unmatched > 0 {
        warn!(
            unmatched = report.unmatched,
            "Some lines kept their invoice quantity; add catalog overrides for them"
        );
    }

    let json = serde_json::to_string_pretty(&output_rows(&report))?;
    match &output_path {
        Some(path) => {
            fs::write(path, json)
                .with_context(|| format!("Failed to write results to {}", path.display()))?;
            info!(output = %path.display(), "Results written");
        }
        None => println!("{}", json),
    }

    if let (Some(handle), Some(path)) = (&metrics_handle, &config.observability.metrics_output_path) {
        observability::write_metrics_snapshot(handle, path)?;
    }

    Ok(())
}
