//! # Text Processing Module
//!
//! This module canonicalizes free-text product names taken from supplier invoices
//! ("FRIJOL CALIMA*500G", "ACEITE*3000ML REF FRISOYA", "ARROZ AGRANEL") into a token
//! sequence that the component extractor and the catalog matcher can compare.
//!
//! ## Features
//!
//! - Diacritic stripping and upper-casing (`"Azúcar"` → `"AZUCAR"`)
//! - Punctuation folding: `* - / _ , . ;` become token separators
//! - **Unit canonicalization**: `GR`/`GRAMOS` → `G`, `ML` → `CC`, `KILO`/`KILOS` → `KG`,
//!   anchored on the preceding digits so `"500 GR"` becomes the single token `500G`
//! - Spanish stop-word removal (`DE`, `LA`, `EL`, `LOS`, `LAS`, `A`, `AL`, `DEL`)
//!
//! Normalization is idempotent: normalizing the space-joined output of [`normalize_tokens`]
//! yields the same token sequence.

use crate::components::{extract_components, ComponentSet};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::trace;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Characters folded into token separators
pub const SEPARATOR_CHARS: [char; 7] = ['*', '-', '/', '_', ',', '.', ';'];

/// Spanish articles and prepositions dropped from product names
pub const STOP_WORDS: [&str; 8] = ["DE", "LA", "EL", "LOS", "LAS", "A", "AL", "DEL"];

lazy_static! {
    static ref GRAMS_SPELLING: Regex =
        Regex::new(r"(\d+)\s*(?:GRAMOS|GR|G)\b").expect("Invalid grams spelling regex");
    static ref VOLUME_SPELLING: Regex =
        Regex::new(r"(\d+)\s*(?:ML|CC)\b").expect("Invalid volume spelling regex");
    static ref KILOS_SPELLING: Regex =
        Regex::new(r"(\d+)\s*(?:KILOS|KILO|KG)\b").expect("Invalid kilos spelling regex");
}

/// A product name as read from an invoice line, with its canonical tokens and components
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductDescription {
    /// Product name exactly as the invoice parser supplied it
    pub raw_text: String,
    /// Canonical token sequence, in reading order
    pub normalized_tokens: Vec<String>,
    /// Core words, measurement tokens and modifiers derived from the tokens
    pub components: ComponentSet,
}

impl ProductDescription {
    /// Normalize and classify a raw product name
    ///
    /// # Examples
    ///
    /// ```rust
    /// use invoice_kilos::text_processing::ProductDescription;
    ///
    /// let description = ProductDescription::new("FRIJOL CALIMA*500GR");
    /// assert_eq!(description.normalized_tokens, vec!["FRIJOL", "CALIMA", "500G"]);
    /// assert!(description.components.core_words.contains("FRIJOL"));
    /// assert!(description.components.measurements.contains("500G"));
    /// ```
    pub fn new(raw_text: &str) -> Self {
        let normalized_tokens = normalize_tokens(raw_text);
        let components = extract_components(&normalized_tokens);
        Self {
            raw_text: raw_text.to_string(),
            normalized_tokens,
            components,
        }
    }

    /// Whether the product is sold in bulk sacks ("A GRANEL")
    pub fn is_bulk(&self) -> bool {
        self.components.is_bulk()
    }

    /// Canonical tokens joined with single spaces
    pub fn normalized_text(&self) -> String {
        self.normalized_tokens.join(" ")
    }
}

/// Check a raw name for the bulk marker; `"A GRANEL"` and `"AGRANEL"` both count
pub fn is_bulk_product(raw_text: &str) -> bool {
    extract_components(&normalize_tokens(raw_text)).is_bulk()
}

/// Strip combining marks after compatibility decomposition
fn strip_diacritics(text: &str) -> String {
    text.nfkd().filter(|c| !is_combining_mark(*c)).collect()
}

/// Rewrite unit spellings glued or spaced after digits into their canonical suffix
pub fn canonicalize_units(text: &str) -> String {
    let text = GRAMS_SPELLING.replace_all(text, "${1}G");
    let text = VOLUME_SPELLING.replace_all(&text, "${1}CC");
    KILOS_SPELLING.replace_all(&text, "${1}KG").into_owned()
}

/// Canonicalize a raw product name into its token sequence
///
/// Steps, in order: strip diacritics, uppercase, fold separator punctuation into spaces,
/// drop stop words, canonicalize unit spellings, split on whitespace.
///
/// Stop words are dropped before the unit rewrite so that a dropped word never leaves a
/// digit and a unit spelling newly adjacent for a second pass to merge.
///
/// # Examples
///
/// ```rust
/// use invoice_kilos::text_processing::normalize_tokens;
///
/// assert_eq!(
///     normalize_tokens("Aceite de Soya*500 ml La Orlandesa"),
///     vec!["ACEITE", "SOYA", "500CC", "ORLANDESA"]
/// );
/// assert_eq!(normalize_tokens("AZÚCAR*1 KILO"), vec!["AZUCAR", "1KG"]);
/// ```
pub fn normalize_tokens(raw_text: &str) -> Vec<String> {
    if raw_text.trim().is_empty() {
        return Vec::new();
    }

    // Upper-casing can reintroduce decomposable characters, so strip on both sides of it
    let cleaned = strip_diacritics(&strip_diacritics(raw_text).to_uppercase());
    let cleaned: String = cleaned
        .chars()
        .map(|c| if SEPARATOR_CHARS.contains(&c) { ' ' } else { c })
        .collect();

    let kept: Vec<&str> = cleaned
        .split_whitespace()
        .filter(|token| !STOP_WORDS.contains(token))
        .collect();

    let tokens: Vec<String> = canonicalize_units(&kept.join(" "))
        .split_whitespace()
        .map(str::to_string)
        .collect();

    trace!("Normalized '{}' -> {:?}", raw_text, tokens);
    tokens
}

/// Canonical form of a product name as a single string
pub fn normalize_text(raw_text: &str) -> String {
    normalize_tokens(raw_text).join(" ")
}
