//! # Quantity Extraction Module
//!
//! Reads the weight or volume printed inside a product name. Each pattern is an
//! independent function so it can be tested on its own; [`extract_quantity`] tries them in
//! priority order and the first match wins:
//!
//! 1. multi-pack grams, `125G*8UND` → 1000 g
//! 2. kilograms, `1KG`, `24 KILOS` → value × 1000 g
//! 3. plain grams, `500G`, `250GR`, `400 GRAMOS`
//! 4. volume, `500CC`, `1000ML`
//!
//! Patterns run on the raw (upper-cased) name, before tokenization, so separators such as
//! the `*` in `125G*8UND` are still visible.

use lazy_static::lazy_static;
use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::trace;

lazy_static! {
    static ref MULTI_PACK_PATTERN: Regex =
        Regex::new(r"(\d+)\s*(?:G|GR|GRAMOS)\s*\*\s*(\d+)\s*UND").expect("Invalid multi-pack regex");
    static ref KILOGRAMS_PATTERN: Regex =
        Regex::new(r"(\d+)\s*(?:KG|KILO|KILOS)\b").expect("Invalid kilograms regex");
    static ref GRAMS_PATTERN: Regex =
        Regex::new(r"(\d+)\s*(?:G|GR|GRAMOS)\b").expect("Invalid grams regex");
    static ref VOLUME_PATTERN: Regex =
        Regex::new(r"(\d+)\s*(?:CC|ML)\b").expect("Invalid volume regex");
}

/// Whether the embedded quantity is a mass or a volume
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuantityKind {
    /// Grams (kilogram spellings are already scaled)
    Mass,
    /// Cubic centimetres / millilitres
    Volume,
    /// Nothing recognizable: bulk or unit-only product
    Absent,
}

/// Weight or volume found in a product name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedQuantity {
    pub kind: QuantityKind,
    /// Grams for [`QuantityKind::Mass`], cc for [`QuantityKind::Volume`], 0 otherwise
    pub value: u64,
}

impl ExtractedQuantity {
    pub const ABSENT: ExtractedQuantity = ExtractedQuantity {
        kind: QuantityKind::Absent,
        value: 0,
    };

    pub fn is_absent(&self) -> bool {
        self.value == 0
    }

    /// Grams, converting a volume with the given density (g per cc); 0 past the decimal range
    pub fn grams_equivalent(&self, density: Decimal) -> Decimal {
        match self.kind {
            QuantityKind::Mass => Decimal::from(self.value),
            QuantityKind::Volume => Decimal::from(self.value)
                .checked_mul(density)
                .unwrap_or(Decimal::ZERO),
            QuantityKind::Absent => Decimal::ZERO,
        }
    }
}

fn parse_number(text: &str) -> u64 {
    text.parse::<u64>().unwrap_or(0)
}

/// `125G*8UND` → grams × units
pub fn extract_multi_pack_grams(name: &str) -> Option<u64> {
    let captures = MULTI_PACK_PATTERN.captures(name)?;
    let grams = parse_number(&captures[1]);
    let units = parse_number(&captures[2]);
    Some(grams.checked_mul(units).unwrap_or(0))
}

/// `2KG`, `24 KILOS` → grams
pub fn extract_kilograms_as_grams(name: &str) -> Option<u64> {
    let captures = KILOGRAMS_PATTERN.captures(name)?;
    Some(parse_number(&captures[1]).checked_mul(1000).unwrap_or(0))
}

/// `500G`, `250GR`, `400 GRAMOS` → grams
pub fn extract_plain_grams(name: &str) -> Option<u64> {
    let captures = GRAMS_PATTERN.captures(name)?;
    Some(parse_number(&captures[1]))
}

/// `500CC`, `1000ML` → cc
pub fn extract_volume_cc(name: &str) -> Option<u64> {
    let captures = VOLUME_PATTERN.captures(name)?;
    Some(parse_number(&captures[1]))
}

/// Grams printed in the name via the mass patterns only, 0 when none match
pub fn extract_weight_grams(raw_name: &str) -> u64 {
    let name = raw_name.to_uppercase();
    extract_multi_pack_grams(&name)
        .or_else(|| extract_kilograms_as_grams(&name))
        .or_else(|| extract_plain_grams(&name))
        .unwrap_or(0)
}

/// Run every pattern in priority order over the raw product name
///
/// # Examples
///
/// ```rust
/// use invoice_kilos::quantity_extraction::{extract_quantity, QuantityKind};
///
/// let panela = extract_quantity("PANELA*125G*8UND TEJO");
/// assert_eq!(panela.kind, QuantityKind::Mass);
/// assert_eq!(panela.value, 1000);
///
/// let aceite = extract_quantity("ACEITE*3000ML REF FRISOYA");
/// assert_eq!(aceite.kind, QuantityKind::Volume);
/// assert_eq!(aceite.value, 3000);
///
/// assert!(extract_quantity("ARROZ AGRANEL").is_absent());
/// ```
pub fn extract_quantity(raw_name: &str) -> ExtractedQuantity {
    let name = raw_name.to_uppercase();

    let grams = extract_weight_grams(&name);
    let quantity = if grams > 0 {
        ExtractedQuantity {
            kind: QuantityKind::Mass,
            value: grams,
        }
    } else {
        match extract_volume_cc(&name) {
            Some(cc) if cc > 0 => ExtractedQuantity {
                kind: QuantityKind::Volume,
                value: cc,
            },
            _ => ExtractedQuantity::ABSENT,
        }
    };

    trace!("Extracted {:?} from '{}'", quantity, raw_name);
    quantity
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_multi_pack_pattern() {
        assert_eq!(extract_multi_pack_grams("PANELA*125G*8UND TEJO"), Some(1000));
        assert_eq!(extract_multi_pack_grams("PANELA 125 GR * 8 UND"), Some(1000));
        assert_eq!(extract_multi_pack_grams("PANELA*500G CUADRADA"), None);
    }

    #[test]
    fn test_kilograms_pattern() {
        assert_eq!(extract_kilograms_as_grams("AZUCAR BLANCO*1KG PROVIDENCIA"), Some(1000));
        assert_eq!(extract_kilograms_as_grams("ARROZ*24KILOS"), Some(24000));
        assert_eq!(extract_kilograms_as_grams("ARROZ 5 KILO"), Some(5000));
        assert_eq!(extract_kilograms_as_grams("ARROZ*500G"), None);
    }

    #[test]
    fn test_plain_grams_pattern() {
        assert_eq!(extract_plain_grams("FRIJOL*250GR"), Some(250));
        assert_eq!(extract_plain_grams("HARINA*500G"), Some(500));
        assert_eq!(extract_plain_grams("LECHE 900 GRAMOS"), Some(900));
        assert_eq!(extract_plain_grams("GALLETAS GRANDES"), None);
    }

    #[test]
    fn test_volume_pattern() {
        assert_eq!(extract_volume_cc("ACEITE*500CC"), Some(500));
        assert_eq!(extract_volume_cc("ACEITE*1000ML"), Some(1000));
        assert_eq!(extract_volume_cc("ACEITE*1000MLS"), None);
    }

    #[test]
    fn test_priority_multi_pack_before_plain_grams() {
        let quantity = extract_quantity("panela*125g*8und tejo");
        assert_eq!(quantity.value, 1000);
        assert_eq!(quantity.kind, QuantityKind::Mass);
    }

    #[test]
    fn test_priority_mass_before_volume() {
        let quantity = extract_quantity("MIX 500CC 250G");
        assert_eq!(quantity.kind, QuantityKind::Mass);
        assert_eq!(quantity.value, 250);
    }

    #[test]
    fn test_nothing_found() {
        assert_eq!(extract_quantity("TOALLA COCINA BCO NUBE"), ExtractedQuantity::ABSENT);
        assert_eq!(extract_quantity(""), ExtractedQuantity::ABSENT);
        assert_eq!(extract_weight_grams("SERVILLETA BCA NUBE*300UND"), 0);
    }

    #[test]
    fn test_overflowing_number_falls_back_to_zero() {
        assert_eq!(extract_plain_grams("ARROZ 99999999999999999999999G"), Some(0));
        assert!(extract_quantity("ARROZ 99999999999999999999999G").is_absent());
    }

    #[test]
    fn test_grams_equivalent_uses_density() {
        let volume = ExtractedQuantity {
            kind: QuantityKind::Volume,
            value: 3000,
        };
        assert_eq!(volume.grams_equivalent(dec!(0.92)), dec!(2760));
        assert_eq!(volume.grams_equivalent(Decimal::ONE), dec!(3000));
        assert_eq!(ExtractedQuantity::ABSENT.grams_equivalent(Decimal::ONE), Decimal::ZERO);
    }
}
