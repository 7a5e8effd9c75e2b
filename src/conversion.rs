//! # Conversion Calculator
//!
//! Entry points of the engine. [`ConversionEngine`] owns a shared catalog snapshot and
//! turns `(raw_name, quantity, unit_code)` into a [`ConversionResult`] in kilograms.
//!
//! Conversion never fails: an unknown product degrades to `source = Default` with the
//! default presentation, and batches report those lines as an advisory count.

use crate::catalog::Catalog;
use crate::catalog_matcher::CatalogMatcher;
use crate::config::EngineConfig;
use crate::observability;
use crate::quantity_extraction::extract_quantity;
use crate::text_processing::ProductDescription;
use crate::unit_code::{reconcile, FactorBasis, Reconciliation, UnitCode};
use chrono::{DateTime, Utc};
use rayon::prelude::*;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Where the presentation factor came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversionSource {
    /// Accepted catalog match
    Catalog,
    /// Unit code or the product name itself
    Extracted,
    /// Nothing matched, `default_presentation` applied
    Default,
}

impl ConversionSource {
    pub fn as_str(self) -> &'static str {
        match self {
            ConversionSource::Catalog => "catalog",
            ConversionSource::Extracted => "extracted",
            ConversionSource::Default => "default",
        }
    }
}

impl fmt::Display for ConversionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kilogram quantity of one invoice line with its provenance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionResult {
    pub kilograms: Decimal,
    /// Presentation multiplier that was applied
    pub factor_used: Decimal,
    /// Grams read from the product name, 0 when none
    pub extracted_weight_grams: u64,
    pub source: ConversionSource,
    pub basis: FactorBasis,
    /// Audit trail, e.g. `(500 * 24 / 1000) * 10 = 120.000 kg`
    pub formula: String,
    /// Canonical name of the accepted catalog entry
    pub matched_entry: Option<String>,
}

impl ConversionResult {
    /// Whether the line counts toward the "sin factor de conversión" advisory
    pub fn is_unmatched(&self) -> bool {
        self.source == ConversionSource::Default
    }

    /// Kilograms are just the invoice quantity times the default presentation
    pub fn is_pass_through(&self) -> bool {
        self.source == ConversionSource::Default && self.basis == FactorBasis::Direct
    }
}

/// One invoice line as produced by an invoice parser
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceLine {
    pub raw_name: String,
    pub quantity: Decimal,
    #[serde(default)]
    pub unit_code: Option<String>,
    #[serde(default)]
    pub unit_price: Option<Decimal>,
    #[serde(default)]
    pub total_price: Option<Decimal>,
}

impl InvoiceLine {
    pub fn new(raw_name: &str, quantity: Decimal, unit_code: Option<&str>) -> Self {
        Self {
            raw_name: raw_name.to_string(),
            quantity,
            unit_code: unit_code.map(str::to_string),
            unit_price: None,
            total_price: None,
        }
    }

    pub fn with_prices(mut self, unit_price: Decimal, total_price: Decimal) -> Self {
        self.unit_price = Some(unit_price);
        self.total_price = Some(total_price);
        self
    }
}

/// Invoice line after conversion, ready for an exporter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvertedLine {
    pub line: InvoiceLine,
    pub result: ConversionResult,
    /// Price per kilogram, or the original unit price when nothing converted
    pub unit_price: Option<Decimal>,
    /// `Kg` once converted, `Un` for pass-through lines
    pub unit_of_measure: String,
}

/// Results of a batch plus the unmatched-line advisory
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    pub lines: Vec<ConvertedLine>,
    pub unmatched: usize,
    pub processed_at: DateTime<Utc>,
}

impl BatchReport {
    fn from_lines(lines: Vec<ConvertedLine>) -> Self {
        let unmatched = lines.iter().filter(|l| l.result.is_unmatched()).count();
        Self {
            lines,
            unmatched,
            processed_at: Utc::now(),
        }
    }

    pub fn results(&self) -> impl Iterator<Item = &ConversionResult> {
        self.lines.iter().map(|line| &line.result)
    }

    /// Saturates at `Decimal::MAX`
    pub fn total_kilograms(&self) -> Decimal {
        self.results().fold(Decimal::ZERO, |total, r| {
            total.checked_add(r.kilograms).unwrap_or(Decimal::MAX)
        })
    }

    /// Non-fatal advisory for the caller, `None` when every line converted
    pub fn warning(&self) -> Option<String> {
        if self.unmatched == 0 {
            None
        } else {
            Some(format!(
                "{} productos sin factor de conversión, usado 1:1",
                self.unmatched
            ))
        }
    }
}

/// Format a decimal for export: fixed fractional digits, comma separator
///
/// ```rust
/// use invoice_kilos::conversion::format_decimal;
/// use rust_decimal_macros::dec;
///
/// assert_eq!(format_decimal(dec!(120), 5), "120,00000");
/// assert_eq!(format_decimal(dec!(687.5), 5), "687,50000");
/// ```
pub fn format_decimal(value: Decimal, decimals: u32) -> String {
    let rounded = value.round_dp(decimals);
    format!("{:.*}", decimals as usize, rounded).replace('.', ",")
}

fn format_formula(reconciliation: &Reconciliation, quantity: Decimal, kilograms: Decimal) -> String {
    let total = format!("{:.3}", kilograms.round_dp(3));
    match reconciliation.basis {
        FactorBasis::Weighted => format!(
            "({} * {} / 1000) * {} = {} kg",
            reconciliation.grams.normalize(),
            reconciliation.presentation.normalize(),
            quantity.normalize(),
            total
        ),
        FactorBasis::Direct => format!(
            "{} * {} = {} kg",
            reconciliation.presentation.normalize(),
            quantity.normalize(),
            total
        ),
    }
}

/// Pure conversion over a read-only catalog snapshot
///
/// Cloning is cheap; the catalog is shared behind an `Arc`, so one engine can serve any
/// number of worker threads.
#[derive(Debug, Clone)]
pub struct ConversionEngine {
    catalog: Arc<Catalog>,
    matcher: CatalogMatcher,
    config: EngineConfig,
}

impl ConversionEngine {
    pub fn new(catalog: Arc<Catalog>, config: EngineConfig) -> Self {
        let matcher = CatalogMatcher::new(config.weights, config.match_threshold);
        Self {
            catalog,
            matcher,
            config,
        }
    }

    /// Engine over the built-in catalog with default settings
    pub fn with_builtin_catalog() -> Self {
        Self::new(Arc::new(Catalog::builtin()), EngineConfig::default())
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Convert one line using the configured default presentation
    ///
    /// # Examples
    ///
    /// ```rust
    /// use invoice_kilos::conversion::{ConversionEngine, ConversionSource};
    /// use rust_decimal_macros::dec;
    ///
    /// let engine = ConversionEngine::with_builtin_catalog();
    /// let result = engine.convert("ARROZ AGRANEL", dec!(2), Some("UND"));
    /// assert_eq!(result.kilograms, dec!(100));
    /// assert_eq!(result.source, ConversionSource::Catalog);
    /// ```
    pub fn convert(
        &self,
        raw_name: &str,
        invoice_quantity: Decimal,
        original_unit_code: Option<&str>,
    ) -> ConversionResult {
        self.convert_with_presentation(
            raw_name,
            invoice_quantity,
            original_unit_code,
            self.config.default_presentation,
        )
    }

    /// Convert one line with an explicit fallback presentation
    pub fn convert_with_presentation(
        &self,
        raw_name: &str,
        invoice_quantity: Decimal,
        original_unit_code: Option<&str>,
        default_presentation: Decimal,
    ) -> ConversionResult {
        let start = Instant::now();

        let description = ProductDescription::new(raw_name);
        let quantity = extract_quantity(raw_name);
        let unit_code = UnitCode::parse(original_unit_code);
        let catalog_match = self.matcher.find_best(&description.components, &self.catalog);

        if let Some(m) = &catalog_match {
            debug!(
                product_name = %raw_name,
                entry = %m.entry.canonical_name,
                score = m.final_score(),
                tier = m.tier().as_str(),
                "Catalog match accepted"
            );
        }

        let reconciliation = reconcile(
            unit_code,
            &description,
            quantity,
            catalog_match.map(|m| m.entry.factor),
            default_presentation,
            &self.config,
        );

        let grams = quantity.grams_equivalent(self.config.volume_density);
        let invoice_quantity = invoice_quantity.max(Decimal::ZERO);
        let (reconciliation, kilograms) =
            match reconciliation.kilograms_per_unit.checked_mul(invoice_quantity) {
                Some(kilograms) => (reconciliation, kilograms),
                None => {
                    warn!(
                        product_name = %raw_name,
                        quantity = %invoice_quantity,
                        "Kilogram total overflows, using the default presentation"
                    );
                    let fallback = Reconciliation::unmatched(default_presentation, grams);
                    match fallback.kilograms_per_unit.checked_mul(invoice_quantity) {
                        Some(kilograms) => (fallback, kilograms),
                        None => (
                            Reconciliation::unmatched(Decimal::ONE, Decimal::ZERO),
                            invoice_quantity,
                        ),
                    }
                }
            };
        let kilograms = kilograms.max(Decimal::ZERO);
        let formula = format_formula(&reconciliation, invoice_quantity, kilograms);

        let result = ConversionResult {
            kilograms,
            factor_used: reconciliation.presentation,
            extracted_weight_grams: grams.trunc().to_u64().unwrap_or(0),
            source: reconciliation.source,
            basis: reconciliation.basis,
            formula,
            matched_entry: catalog_match
                .filter(|_| reconciliation.source != ConversionSource::Default)
                .map(|m| m.entry.canonical_name.clone()),
        };

        observability::record_conversion_metrics(result.source, start.elapsed());
        debug!(
            product_name = %raw_name,
            kilograms = %result.kilograms,
            source = result.source.as_str(),
            formula = %result.formula,
            "Line converted"
        );
        result
    }

    /// Convert a parsed invoice line and recompute its unit price per kilogram
    pub fn convert_line(&self, line: &InvoiceLine) -> ConvertedLine {
        let result = self.convert(&line.raw_name, line.quantity, line.unit_code.as_deref());

        let pass_through = result.is_pass_through();

        // A price per kilogram outside the decimal range keeps the invoice price
        let unit_price = match line.total_price {
            Some(total) if result.kilograms > Decimal::ZERO && !pass_through => total
                .checked_div(result.kilograms)
                .or(line.unit_price),
            _ => line.unit_price,
        };

        ConvertedLine {
            line: line.clone(),
            unit_price,
            unit_of_measure: if pass_through { "Un" } else { "Kg" }.to_string(),
            result,
        }
    }

    /// Convert lines in order, calling `progress(done, total)` after each one
    pub fn convert_batch(
        &self,
        lines: &[InvoiceLine],
        progress: Option<&dyn Fn(usize, usize)>,
    ) -> BatchReport {
        let start = Instant::now();
        let total = lines.len();

        let converted: Vec<ConvertedLine> = lines
            .iter()
            .enumerate()
            .map(|(index, line)| {
                let converted = self.convert_line(line);
                if let Some(progress) = progress {
                    progress(index + 1, total);
                }
                converted
            })
            .collect();

        self.finish_batch(converted, start)
    }

    /// Convert lines on the rayon pool; output order matches input order
    pub fn convert_batch_parallel(&self, lines: &[InvoiceLine]) -> BatchReport {
        let start = Instant::now();
        let converted: Vec<ConvertedLine> =
            lines.par_iter().map(|line| self.convert_line(line)).collect();
        self.finish_batch(converted, start)
    }

    fn finish_batch(&self, converted: Vec<ConvertedLine>, start: Instant) -> BatchReport {
        let report = BatchReport::from_lines(converted);
        observability::record_batch_metrics(report.lines.len(), report.unmatched, start.elapsed());

        if let Some(warning) = report.warning() {
            warn!(unmatched = report.unmatched, "{}", warning);
        }
        info!(
            lines = report.lines.len(),
            unmatched = report.unmatched,
            total_kilograms = %report.total_kilograms(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Batch converted"
        );
        report
    }
}
