//! # Invoice Kilos
//!
//! Normalizes free-text product names from supplier invoices and converts every
//! invoiced quantity into kilograms, using a catalog of known presentations, the weight
//! or volume printed in the name, and the declared unit code (UND, P25, CJ12, B20, KG).

pub mod catalog;
pub mod catalog_matcher;
pub mod components;
pub mod config;
pub mod conversion;
pub mod errors;
pub mod observability;
pub mod observability_config;
pub mod quantity_extraction;
pub mod text_processing;
pub mod unit_code;

// Re-export types for easier access
pub use catalog::{Catalog, CatalogEntry, ConversionStore, JsonFileConversionStore, MemoryConversionStore};
pub use catalog_matcher::{CatalogMatch, CatalogMatcher, MatchTier};
pub use config::{AppConfig, EngineConfig};
pub use conversion::{
    format_decimal, BatchReport, ConversionEngine, ConversionResult, ConversionSource, ConvertedLine,
    InvoiceLine,
};
pub use text_processing::ProductDescription;
pub use unit_code::UnitCode;
