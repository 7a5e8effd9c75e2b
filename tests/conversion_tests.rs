use invoice_kilos::catalog::{Catalog, MemoryConversionStore};
use invoice_kilos::config::EngineConfig;
use invoice_kilos::conversion::{format_decimal, ConversionEngine, ConversionSource, InvoiceLine};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::sync::Arc;

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> ConversionEngine {
        ConversionEngine::with_builtin_catalog()
    }

    fn sample_lines() -> Vec<InvoiceLine> {
        vec![
            InvoiceLine::new("FRIJOL CALIMA*500G", dec!(55), Some("P25")),
            InvoiceLine::new("ACEITE SOYA*500CC LA ORLANDESA E", dec!(10), Some("CJ24")),
            InvoiceLine::new("ARROZ AGRANEL", dec!(2), Some("UND")),
            InvoiceLine::new("PRODUCTO NUEVO*500G", dec!(3), Some("UND")),
            InvoiceLine::new("DETERGENTE MULTIUSOS", dec!(6), None),
            InvoiceLine::new("PANELA*125G*8UND TEJO", dec!(4), Some("UND")),
            InvoiceLine::new("CEBADA PERLADA A GRANEL CON IVA", dec!(12.5), Some("KG")),
        ]
    }

    #[test]
    fn test_packed_beans_per_paca() {
        let result = engine().convert("FRIJOL CALIMA*500G", dec!(55), Some("P25"));
        assert_eq!(result.kilograms, dec!(687.5));
        assert_eq!(result.extracted_weight_grams, 500);
        assert_eq!(result.factor_used, dec!(25));
    }

    #[test]
    fn test_oil_per_box() {
        let result = engine().convert("ACEITE SOYA*500CC LA ORLANDESA E", dec!(10), Some("CJ24"));
        assert_eq!(result.kilograms, dec!(120));
        assert_eq!(format_decimal(result.kilograms, 5), "120,00000");
    }

    #[test]
    fn test_bulk_rice_per_sack() {
        let result = engine().convert("ARROZ AGRANEL", dec!(2), Some("UND"));
        assert_eq!(result.kilograms, dec!(100));
        assert_eq!(result.source, ConversionSource::Catalog);
        assert_eq!(result.extracted_weight_grams, 0);
    }

    #[test]
    fn test_unknown_product_uses_default_presentation() {
        let result = engine().convert("PRODUCTO NUEVO*500G", dec!(3), Some("UND"));
        assert_eq!(result.kilograms, dec!(1.5));
        assert_eq!(result.source, ConversionSource::Default);
        assert_eq!(result.factor_used, Decimal::ONE);
        assert!(result.matched_entry.is_none());
    }

    #[test]
    fn test_explicit_default_presentation() {
        let result =
            engine().convert_with_presentation("PRODUCTO NUEVO*500G", dec!(3), Some("UND"), dec!(12));
        assert_eq!(result.kilograms, dec!(18));
        assert_eq!(result.factor_used, dec!(12));
    }

    #[test]
    fn test_catalog_presentation_for_individual_units() {
        let result = engine().convert("AZUCAR BLANCO*1KG PROVIDENCIA", dec!(2), Some("UND"));
        assert_eq!(result.source, ConversionSource::Catalog);
        assert_eq!(result.kilograms, dec!(50));
    }

    #[test]
    fn test_override_changes_result() {
        let mut overrides = BTreeMap::new();
        overrides.insert("ATUN*170G VAN CAMPS".to_string(), dec!(48));
        let store = MemoryConversionStore::with_factors(overrides);
        let catalog = Arc::new(Catalog::reload(Some(&store)));
        let engine = ConversionEngine::new(catalog, EngineConfig::default());

        let result = engine.convert("ATUN*170G VAN CAMPS", dec!(1), None);
        assert_eq!(result.source, ConversionSource::Catalog);
        assert_eq!(result.kilograms, dec!(8.16));
    }

    #[test]
    fn test_unit_price_recomputed_per_kilogram() {
        let line = InvoiceLine::new("ACEITE SOYA*500CC LA ORLANDESA E", dec!(10), Some("CJ24"))
            .with_prices(dec!(60000), dec!(600000));
        let converted = engine().convert_line(&line);
        assert_eq!(converted.unit_of_measure, "Kg");
        assert_eq!(converted.unit_price, Some(dec!(5000)));
    }

    #[test]
    fn test_unit_price_kept_when_nothing_converted() {
        let line = InvoiceLine::new("ACEITE SOYA*500CC LA ORLANDESA E", Decimal::ZERO, Some("CJ24"))
            .with_prices(dec!(60000), Decimal::ZERO);
        let converted = engine().convert_line(&line);
        assert_eq!(converted.result.kilograms, Decimal::ZERO);
        assert_eq!(converted.unit_price, Some(dec!(60000)));
    }

    #[test]
    fn test_batch_counts_unmatched_lines() {
        let report = engine().convert_batch(&sample_lines(), None);
        assert_eq!(report.lines.len(), 7);
        assert_eq!(report.unmatched, 2);
        assert_eq!(
            report.warning().as_deref(),
            Some("2 productos sin factor de conversión, usado 1:1")
        );
        assert_eq!(report.lines[4].unit_of_measure, "Un");
        assert_eq!(report.lines[4].result.kilograms, dec!(6));
    }

    #[test]
    fn test_batch_reports_progress_after_each_line() {
        let calls = RefCell::new(Vec::new());
        let progress = |done: usize, total: usize| calls.borrow_mut().push((done, total));

        let lines = sample_lines();
        engine().convert_batch(&lines, Some(&progress));

        let calls = calls.into_inner();
        assert_eq!(calls.len(), lines.len());
        assert_eq!(calls.first(), Some(&(1, 7)));
        assert_eq!(calls.last(), Some(&(7, 7)));
    }

    #[test]
    fn test_parallel_batch_matches_sequential() {
        let engine = engine();
        let lines = sample_lines();

        let sequential = engine.convert_batch(&lines, None);
        let parallel = engine.convert_batch_parallel(&lines);

        assert_eq!(sequential.unmatched, parallel.unmatched);
        let left: Vec<_> = sequential.results().cloned().collect();
        let right: Vec<_> = parallel.results().cloned().collect();
        assert_eq!(left, right);
        assert_eq!(sequential.total_kilograms(), parallel.total_kilograms());
    }

    #[test]
    fn test_kilograms_never_negative() {
        for line in sample_lines() {
            let result = engine().convert(&line.raw_name, -line.quantity, line.unit_code.as_deref());
            assert!(result.kilograms >= Decimal::ZERO, "{}", line.raw_name);
        }
    }

    #[test]
    fn test_oversized_override_degrades_to_default() {
        let huge: Decimal = "1000000000000000000000000000".parse().unwrap();
        let mut overrides = BTreeMap::new();
        overrides.insert("ATUN*170G".to_string(), huge);
        let store = MemoryConversionStore::with_factors(overrides);
        let catalog = Arc::new(Catalog::reload(Some(&store)));
        assert_eq!(catalog.get("ATUN*170G").unwrap().factor, huge);
        let engine = ConversionEngine::new(catalog, EngineConfig::default());

        let result = engine.convert("ATUN*170G", dec!(1), Some("UND"));
        assert_eq!(result.source, ConversionSource::Default);
        assert_eq!(result.kilograms, dec!(0.17));
        assert_eq!(result.extracted_weight_grams, 170);
        assert!(result.matched_entry.is_none());
    }

    #[test]
    fn test_oversized_total_degrades_to_default() {
        let mut factors = BTreeMap::new();
        factors.insert("FRIJOL CALIMA*500G".to_string(), dec!(50000000000000000000000000));
        let catalog = Arc::new(Catalog::from_factors(factors));
        let engine = ConversionEngine::new(catalog, EngineConfig::default());

        let result = engine.convert("FRIJOL CALIMA*500G", dec!(1000000), Some("UND"));
        assert_eq!(result.source, ConversionSource::Default);
        assert_eq!(result.kilograms, dec!(500000));
    }

    #[test]
    fn test_unit_price_kept_when_price_per_kilogram_overflows() {
        let line = InvoiceLine::new("PRODUCTO NUEVO*1G", Decimal::new(1, 10), Some("UND"))
            .with_prices(dec!(7), Decimal::from(10_000_000_000_000_000_000u64));
        let converted = engine().convert_line(&line);
        assert!(converted.result.kilograms > Decimal::ZERO);
        assert_eq!(converted.unit_price, Some(dec!(7)));
    }

    #[test]
    fn test_graneles_is_not_a_bulk_sack() {
        let result = engine().convert("ARROZ A GRANELES", dec!(2), Some("UND"));
        assert_eq!(result.source, ConversionSource::Default);
        assert_eq!(result.kilograms, dec!(2));
    }
}
