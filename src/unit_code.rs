//! # Unit Codes
//!
//! Invoices declare a presentation code next to each quantity: `UND` for single units,
//! `P25` for a paca of 25, `CJ12` for a box of 12, `B20` for a 20 kg bulto, `KG` when the
//! quantity is already in kilograms. [`UnitCode::parse`] turns those strings into a tagged
//! variant and [`reconcile`] combines it with the catalog presentation and the weight read
//! from the product name into kilograms per invoiced unit.

use crate::config::EngineConfig;
use crate::conversion::ConversionSource;
use crate::quantity_extraction::ExtractedQuantity;
use crate::text_processing::ProductDescription;
use lazy_static::lazy_static;
use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, warn};

lazy_static! {
    static ref PACK_CODE: Regex = Regex::new(r"^P(\d+)$").expect("Invalid pack code regex");
    static ref BOX_CODE: Regex =
        Regex::new(r"^(?:CJ|CAJ|CAJA)(\d+)$").expect("Invalid box code regex");
    static ref BULK_CODE: Regex =
        Regex::new(r"^B(?:L|TO)?(\d+)$").expect("Invalid bulk code regex");
}

const KILOGRAM_CODES: [&str; 5] = ["KG", "KGM", "KGS", "KILO", "KILOS"];

/// Declared presentation of an invoice quantity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnitCode {
    /// `UND`, missing or unrecognized code
    Individual,
    /// `P<n>`: paca of n units
    PackCount(u32),
    /// `CJ<n>` / `CAJ<n>`: box of n units
    BoxCount(u32),
    /// `B<n>`: bulk sack of n kilograms
    FixedBulkKg(u32),
    /// `KG` / `KGM`: quantity is already kilograms
    AlreadyKilograms,
}

impl UnitCode {
    /// Parse a raw invoice unit code; anything unrecognized is [`UnitCode::Individual`]
    ///
    /// # Examples
    ///
    /// ```rust
    /// use invoice_kilos::unit_code::UnitCode;
    ///
    /// assert_eq!(UnitCode::parse(Some("P25")), UnitCode::PackCount(25));
    /// assert_eq!(UnitCode::parse(Some("cj12")), UnitCode::BoxCount(12));
    /// assert_eq!(UnitCode::parse(Some("B20")), UnitCode::FixedBulkKg(20));
    /// assert_eq!(UnitCode::parse(Some("Kg")), UnitCode::AlreadyKilograms);
    /// assert_eq!(UnitCode::parse(Some("UND")), UnitCode::Individual);
    /// assert_eq!(UnitCode::parse(None), UnitCode::Individual);
    /// ```
    pub fn parse(code: Option<&str>) -> Self {
        let Some(code) = code else {
            return UnitCode::Individual;
        };

        let compact: String = code
            .to_uppercase()
            .chars()
            .filter(|c| !c.is_whitespace() && !matches!(c, '-' | '/' | '.' | '_'))
            .collect();

        if KILOGRAM_CODES.contains(&compact.as_str()) {
            return UnitCode::AlreadyKilograms;
        }

        // A count of zero carries no information, so it degrades to a plain unit
        let count = |pattern: &Regex| -> Option<u32> {
            pattern
                .captures(&compact)
                .and_then(|captures| captures[1].parse::<u32>().ok())
                .filter(|n| *n > 0)
        };

        if let Some(n) = count(&PACK_CODE) {
            UnitCode::PackCount(n)
        } else if let Some(n) = count(&BOX_CODE) {
            UnitCode::BoxCount(n)
        } else if let Some(n) = count(&BULK_CODE) {
            UnitCode::FixedBulkKg(n)
        } else {
            UnitCode::Individual
        }
    }

    /// Units per package declared by the code itself
    pub fn explicit_count(&self) -> Option<u32> {
        match self {
            UnitCode::PackCount(n) | UnitCode::BoxCount(n) => Some(*n),
            _ => None,
        }
    }
}

impl From<&str> for UnitCode {
    fn from(code: &str) -> Self {
        UnitCode::parse(Some(code))
    }
}

impl fmt::Display for UnitCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnitCode::Individual => write!(f, "UND"),
            UnitCode::PackCount(n) => write!(f, "P{}", n),
            UnitCode::BoxCount(n) => write!(f, "CJ{}", n),
            UnitCode::FixedBulkKg(n) => write!(f, "B{}", n),
            UnitCode::AlreadyKilograms => write!(f, "KG"),
        }
    }
}

/// How the per-unit kilograms were derived
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactorBasis {
    /// `presentation × grams / 1000`
    Weighted,
    /// `presentation` is already kilograms per invoiced unit
    Direct,
}

/// Kilograms per invoiced unit, with the presentation that produced it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reconciliation {
    pub kilograms_per_unit: Decimal,
    pub presentation: Decimal,
    /// Grams per single item, 0 for direct factors
    pub grams: Decimal,
    pub basis: FactorBasis,
    pub source: ConversionSource,
}

impl Reconciliation {
    /// `None` when `presentation × grams` leaves the decimal range
    fn weighted(presentation: Decimal, grams: Decimal, source: ConversionSource) -> Option<Self> {
        let kilograms_per_unit = presentation
            .checked_mul(grams)?
            .checked_div(Decimal::ONE_THOUSAND)?;
        Some(Self {
            kilograms_per_unit,
            presentation,
            grams,
            basis: FactorBasis::Weighted,
            source,
        })
    }

    fn direct(presentation: Decimal, source: ConversionSource) -> Self {
        Self {
            kilograms_per_unit: presentation,
            presentation,
            grams: Decimal::ZERO,
            basis: FactorBasis::Direct,
            source,
        }
    }

    /// The rule for a line with no catalog match: default presentation, weighted when the
    /// name carries a weight
    pub fn unmatched(default_presentation: Decimal, grams: Decimal) -> Self {
        if grams > Decimal::ZERO {
            if let Some(reconciliation) =
                Self::weighted(default_presentation, grams, ConversionSource::Default)
            {
                return reconciliation;
            }
        }
        Self::direct(default_presentation, ConversionSource::Default)
    }

    /// Nothing converted the line: kilograms equal the invoice quantity times the default
    pub fn is_pass_through(&self) -> bool {
        self.source == ConversionSource::Default && self.basis == FactorBasis::Direct
    }
}

fn weighted_or_unmatched(
    presentation: Decimal,
    grams: Decimal,
    source: ConversionSource,
    default_presentation: Decimal,
) -> Reconciliation {
    Reconciliation::weighted(presentation, grams, source).unwrap_or_else(|| {
        warn!(
            presentation = %presentation,
            grams = %grams,
            "Presentation factor overflows, using the default presentation"
        );
        Reconciliation::unmatched(default_presentation, grams)
    })
}

/// Reconcile the declared unit code with the catalog presentation and the extracted weight
///
/// `catalog_presentation` is the factor of the accepted catalog match, if any;
/// `default_presentation` stands in when there is none.
pub fn reconcile(
    unit_code: UnitCode,
    description: &ProductDescription,
    quantity: ExtractedQuantity,
    catalog_presentation: Option<Decimal>,
    default_presentation: Decimal,
    config: &EngineConfig,
) -> Reconciliation {
    let grams = quantity.grams_equivalent(config.volume_density);

    let reconciliation = match unit_code {
        UnitCode::AlreadyKilograms => Reconciliation::direct(Decimal::ONE, ConversionSource::Extracted),
        UnitCode::FixedBulkKg(kilograms) => {
            Reconciliation::direct(Decimal::from(kilograms), ConversionSource::Extracted)
        }
        UnitCode::PackCount(n) | UnitCode::BoxCount(n) if grams > Decimal::ZERO => {
            weighted_or_unmatched(
                Decimal::from(n),
                grams,
                ConversionSource::Extracted,
                default_presentation,
            )
        }
        // Counts without a weight in the name cannot be scaled, so they fall back to the
        // per-unit rules below
        UnitCode::PackCount(_) | UnitCode::BoxCount(_) | UnitCode::Individual => {
            if description.is_bulk() {
                match catalog_presentation {
                    Some(kilograms) => Reconciliation::direct(kilograms, ConversionSource::Catalog),
                    None => Reconciliation::direct(config.bulk_default_kg, ConversionSource::Extracted),
                }
            } else {
                let (presentation, source) = match catalog_presentation {
                    Some(presentation) => (presentation, ConversionSource::Catalog),
                    None => (default_presentation, ConversionSource::Default),
                };
                if grams > Decimal::ZERO {
                    weighted_or_unmatched(presentation, grams, source, default_presentation)
                } else {
                    Reconciliation::direct(presentation, source)
                }
            }
        }
    };

    debug!(
        unit_code = %unit_code,
        presentation = %reconciliation.presentation,
        grams = %reconciliation.grams,
        kilograms_per_unit = %reconciliation.kilograms_per_unit,
        source = reconciliation.source.as_str(),
        "Unit code reconciled"
    );
    reconciliation
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quantity_extraction::extract_quantity;
    use rust_decimal_macros::dec;

    fn reconcile_name(name: &str, code: &str, catalog: Option<Decimal>) -> Reconciliation {
        reconcile(
            UnitCode::from(code),
            &ProductDescription::new(name),
            extract_quantity(name),
            catalog,
            Decimal::ONE,
            &EngineConfig::default(),
        )
    }

    #[test]
    fn test_parse_codes() {
        assert_eq!(UnitCode::from("P25"), UnitCode::PackCount(25));
        assert_eq!(UnitCode::from("CAJ6"), UnitCode::BoxCount(6));
        assert_eq!(UnitCode::from("CJ 24"), UnitCode::BoxCount(24));
        assert_eq!(UnitCode::from("BL50"), UnitCode::FixedBulkKg(50));
        assert_eq!(UnitCode::from("KGM"), UnitCode::AlreadyKilograms);
        assert_eq!(UnitCode::from("kg"), UnitCode::AlreadyKilograms);
    }

    #[test]
    fn test_unknown_and_degenerate_codes_are_individual() {
        assert_eq!(UnitCode::from("UND"), UnitCode::Individual);
        assert_eq!(UnitCode::from("NIU"), UnitCode::Individual);
        assert_eq!(UnitCode::from("CJ"), UnitCode::Individual);
        assert_eq!(UnitCode::from("P0"), UnitCode::Individual);
        assert_eq!(UnitCode::from("P99999999999"), UnitCode::Individual);
        assert_eq!(UnitCode::from(""), UnitCode::Individual);
    }

    #[test]
    fn test_display_round_trips_canonical_codes() {
        for code in [UnitCode::PackCount(25), UnitCode::BoxCount(12), UnitCode::FixedBulkKg(20)] {
            assert_eq!(UnitCode::from(code.to_string().as_str()), code);
        }
    }

    #[test]
    fn test_pack_count_scales_extracted_weight() {
        let r = reconcile_name("FRIJOL CALIMA*500G", "P25", Some(dec!(25)));
        assert_eq!(r.kilograms_per_unit, dec!(12.5));
        assert_eq!(r.source, ConversionSource::Extracted);
        assert_eq!(r.basis, FactorBasis::Weighted);
    }

    #[test]
    fn test_pack_of_multi_pack_panela() {
        let r = reconcile_name("PANELA*125G*8UND TEJO", "P24", None);
        assert_eq!(r.kilograms_per_unit, dec!(24));
    }

    #[test]
    fn test_fixed_bulk_code() {
        let r = reconcile_name("SEMILLA GIRASOL A GRANEL", "B20", None);
        assert_eq!(r.kilograms_per_unit, dec!(20));
        assert_eq!(r.basis, FactorBasis::Direct);
    }

    #[test]
    fn test_kilogram_code_passes_through() {
        let r = reconcile_name("CEBADA PERLADA A GRANEL CON IVA", "KG", Some(dec!(50)));
        assert_eq!(r.kilograms_per_unit, Decimal::ONE);
        assert_eq!(r.source, ConversionSource::Extracted);
    }

    #[test]
    fn test_individual_uses_catalog_presentation() {
        let r = reconcile_name("LECHE EN POLVO*380G ENTERA DONA VACA", "UND", Some(dec!(12)));
        assert_eq!(r.kilograms_per_unit, dec!(4.56));
        assert_eq!(r.source, ConversionSource::Catalog);
    }

    #[test]
    fn test_individual_without_catalog_uses_default() {
        let r = reconcile_name("FRIJOL BOLON*500G", "UND", None);
        assert_eq!(r.kilograms_per_unit, dec!(0.5));
        assert_eq!(r.source, ConversionSource::Default);
        assert!(!r.is_pass_through());
    }

    #[test]
    fn test_bulk_without_catalog_uses_default_sack() {
        let r = reconcile_name("CEBADA A GRANEL", "UND", None);
        assert_eq!(r.kilograms_per_unit, dec!(50));
        assert_eq!(r.source, ConversionSource::Extracted);
    }

    #[test]
    fn test_pack_without_weight_falls_back_to_unit_rules() {
        let r = reconcile_name("TOALLA COCINA BCO NUBE", "P12", None);
        assert_eq!(r.kilograms_per_unit, Decimal::ONE);
        assert!(r.is_pass_through());
    }

    #[test]
    fn test_volume_uses_density() {
        let config = EngineConfig {
            volume_density: dec!(0.92),
            ..EngineConfig::default()
        };
        let name = "ACEITE*3000ML REF FRISOYA";
        let r = reconcile(
            UnitCode::Individual,
            &ProductDescription::new(name),
            extract_quantity(name),
            None,
            Decimal::ONE,
            &config,
        );
        assert_eq!(r.kilograms_per_unit, dec!(2.76));
    }

    #[test]
    fn test_oversized_presentation_degrades_to_default() {
        let huge: Decimal = "1000000000000000000000000000".parse().unwrap();
        let r = reconcile_name("ATUN*170G", "UND", Some(huge));
        assert_eq!(r.source, ConversionSource::Default);
        assert_eq!(r.presentation, Decimal::ONE);
        assert_eq!(r.kilograms_per_unit, dec!(0.17));
    }
}
