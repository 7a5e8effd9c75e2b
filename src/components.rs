//! Component extraction: splits a canonical token sequence into core product words,
//! measurement tokens and descriptive modifiers.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Known product-category words
pub const PRODUCT_CATEGORIES: &[&str] = &[
    "ACEITE", "FRIJOL", "ARROZ", "ARVEJA", "PANELA", "HARINA", "PASTA", "LECHE", "AZUCAR",
    "LENTEJA", "GARBANZO", "BLANQUILLO", "BLANCUILLO", "ATUN", "AVENA", "MAIZ", "ALPISTE",
    "CUCHUCO", "CEBADA", "GALLETAS", "SEMILLA", "HOJUELAS", "TOALLA", "SERVILLETA", "MANI",
    "PAJARINA",
];

/// Known descriptive words and brands
pub const DESCRIPTIVE_MODIFIERS: &[&str] = &[
    "AGRANEL", "GRANEL", "BLANCA", "BLANCO", "VERDE", "CALIMA", "PERLADA", "CARAOTA",
    "PALICERO", "BOLA", "BOLON", "MORENA", "PIRA", "GIRASOL", "AZUCARADAS", "POLVO", "ENTERA",
    "COCINA", "IND", "CLUB", "BCO", "BCA", "NUBE", "CARMELITA", "REDONDA", "CUADRADA", "DONA",
    "VACA", "NUTRALAC", "PROVIDENCIA", "TEJO", "SALTALI", "COMARRICO", "ZONIA", "CARACOL",
    "MACARRONCITO", "SPAGHETTI", "CONCHITA", "CORBATA", "CODITO", "GRUESO", "FINO", "VALLE",
    "ANGEL", "ORLANDESA", "FRISOYA", "SAN", "MIGUEL", "REF", "CRAKENAS", "CRAKENA", "TRICOLOR",
    "SOYA", "ROBINA", "BONGUERO", "CARG", "TO", "CARACOTA",
];

/// How a single token participates in matching
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenClass {
    /// Product or brand word that must overlap for a catalog match
    Core,
    /// Size token such as `500G`, `1KG`, `250CC`
    Measurement,
    /// Descriptive word that refines a match
    Modifier,
}

/// Classify one canonical token
///
/// Priority: any digit makes a measurement, then the category vocabulary, then the
/// modifier vocabulary. Unknown words count as core words.
pub fn classify_token(token: &str) -> TokenClass {
    if token.chars().any(|c| c.is_ascii_digit()) {
        TokenClass::Measurement
    } else if PRODUCT_CATEGORIES.contains(&token) {
        TokenClass::Core
    } else if DESCRIPTIVE_MODIFIERS.contains(&token) {
        TokenClass::Modifier
    } else {
        TokenClass::Core
    }
}

/// Token sets used by the catalog matcher
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentSet {
    pub core_words: BTreeSet<String>,
    pub measurements: BTreeSet<String>,
    pub modifiers: BTreeSet<String>,
}

impl ComponentSet {
    /// A description with no core words can never be matched
    pub fn is_matchable(&self) -> bool {
        !self.core_words.is_empty()
    }

    /// Sold by the sack: carries a `GRANEL` / `AGRANEL` marker
    pub fn is_bulk(&self) -> bool {
        self.modifiers.contains("GRANEL") || self.modifiers.contains("AGRANEL")
    }
}

/// Classify every token of a canonical sequence
pub fn extract_components<S: AsRef<str>>(tokens: &[S]) -> ComponentSet {
    let mut components = ComponentSet::default();
    for token in tokens {
        let token = token.as_ref();
        let bucket = match classify_token(token) {
            TokenClass::Measurement => &mut components.measurements,
            TokenClass::Core => &mut components.core_words,
            TokenClass::Modifier => &mut components.modifiers,
        };
        bucket.insert(token.to_string());
    }
    components
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification_priority() {
        assert_eq!(classify_token("500G"), TokenClass::Measurement);
        assert_eq!(classify_token("8UND"), TokenClass::Measurement);
        assert_eq!(classify_token("ACEITE"), TokenClass::Core);
        assert_eq!(classify_token("AGRANEL"), TokenClass::Modifier);
        assert_eq!(classify_token("ORLANDESA"), TokenClass::Modifier);
        // Unknown words still take part in matching
        assert_eq!(classify_token("NUEVO"), TokenClass::Core);
    }

    #[test]
    fn test_extract_components() {
        let tokens = ["FRIJOL", "CALIMA", "500G"];
        let components = extract_components(&tokens);
        assert_eq!(components.core_words.len(), 1);
        assert!(components.core_words.contains("FRIJOL"));
        assert!(components.modifiers.contains("CALIMA"));
        assert!(components.measurements.contains("500G"));
        assert!(components.is_matchable());
    }

    #[test]
    fn test_bulk_marker() {
        assert!(extract_components(&["ARROZ", "AGRANEL"]).is_bulk());
        assert!(extract_components(&["LENTEJA", "GRANEL"]).is_bulk());
        assert!(!extract_components(&["ARROZ", "500G"]).is_bulk());
    }

    #[test]
    fn test_only_modifiers_is_not_matchable() {
        let components = extract_components(&["AGRANEL", "500G"]);
        assert!(!components.is_matchable());
    }
}
