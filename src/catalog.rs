//! # Presentation Catalog
//!
//! The catalog maps canonical product names to a presentation factor: units per package
//! for packaged goods ("ACEITE*500ML REF FRISOYA" → 24 bottles per box) or kilograms per
//! sack for bulk goods ("ARROZ A GRANEL" → 50).
//!
//! A [`Catalog`] is built once per batch by [`Catalog::reload`], which merges the built-in
//! conversion map with operator overrides read from a [`ConversionStore`]. The snapshot is
//! never mutated afterwards; share it behind an `Arc` across conversion workers.

use crate::components::ComponentSet;
use crate::errors::{error_logging, AppError, AppResult};
use crate::text_processing::ProductDescription;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Built-in presentation factors, before operator overrides
///
/// Bulk entries carry kilograms per sack; packaged entries carry units per package;
/// unit-only items without any weight keep a factor of 1.
pub fn builtin_conversion_map() -> BTreeMap<String, Decimal> {
    let entries = [
        // Bulk sacks, kilograms per bulto
        ("ARROZ AGRANEL", dec!(50)),
        ("ARROZ A GRANEL", dec!(50)),
        ("ARVEJA VERDE AGRANEL", dec!(50)),
        ("ARVEJA VERDE A GRANEL", dec!(50)),
        ("BLANQUILLO AGRANEL FRIJOL", dec!(50)),
        ("BLANQUILLO A GRANEL FRIJOL", dec!(50)),
        ("FRIJOL CALIMA AGRANEL", dec!(50)),
        ("FRIJOL CALIMA A GRANEL", dec!(50)),
        ("FRIJOL CARAOTA AGRANEL", dec!(50)),
        ("FRIJOL CARG/TO AGRANEL", dec!(50)),
        ("FRIJOL CARG/TO A GRANEL", dec!(50)),
        ("GARBANZO AGRANEL", dec!(50)),
        ("LENTEJA A GRANEL", dec!(50)),
        ("CEBADA PERLADA A GRANEL CON IVA", dec!(50)),
        ("ALPISTE A GRANEL", dec!(50)),
        ("SEMILLA GIRASOL x GRANEL", dec!(20)),
        ("SEMILLA GIRASOL AGRANEL", dec!(20)),
        // Oils, bottles per box
        ("ACEITE*500ML REF FRISOYA", dec!(24)),
        ("ACEITE SOYA*500CC LA ORLANDESA E", dec!(24)),
        ("ACEITE SOYA*500CC SU ACEITE", dec!(24)),
        ("ACEITE SAN MIGUEL DE SOYA*500CC", dec!(24)),
        ("ACEITE SOYA*250CC LA ORLANDESA", dec!(24)),
        ("ACEITE SAN MIGUEL DE SOYA*250CC", dec!(24)),
        ("ACEITE*1000ML REF FRISOYA", dec!(12)),
        ("ACEITE SOYA*1000CC LA ORLANDESA E", dec!(12)),
        ("ACEITE SAN MIGUEL DE SOYA*1000CC", dec!(12)),
        ("ACEITE*2000ML REF FRISOYA", dec!(6)),
        ("ACEITE*3000ML REF FRISOYA", dec!(6)),
        ("ACEITE SOYA*3000CC LA ORLANDESA", dec!(6)),
        ("ACEITE SAN MIGUEL DE SOYA*3000CC", dec!(6)),
        ("ACEITE*5000ML REF FRISOYA", dec!(2)),
        ("ACEITE SOYA*5000CC LA ORLANDESA E", dec!(2)),
        ("ACEITE SAN MIGUEL DE SOYA*5000CC", dec!(2)),
        // Seeds and cereal
        ("SEMILLA GIRASOL*200G", dec!(12)),
        ("HOJUELAS AZUCARADAS*40G", dec!(80)),
        // Powdered milk, cans per box
        ("LECHE EN POLVO*380G ENTERA DONA VACA", dec!(12)),
        ("LECHE EN POLVO*380GR ENTERA NUTRALAC", dec!(12)),
        ("LECHE EN POLVO*380GR ENTERA DONA VACA", dec!(12)),
        ("LECHE EN POLVO*900GR ENTERA NUTRALAC", dec!(12)),
        ("LECHE EN POLVO*900GR ENTERA DONA VACA", dec!(12)),
        ("LECHE EN POLVO*900G ENTERA DONA VACA", dec!(12)),
        // Sugar and panela
        ("AZUCAR BLANCO*1KG PROVIDENCIA", dec!(25)),
        ("PANELA*125G*8UND TEJO", dec!(24)),
        ("PANELA TEJO/8UND*125GR", dec!(24)),
        // Packaged beans, bags per paca
        ("FRIJOL CALIMA*500G", dec!(25)),
        ("FRIJOL CALIMA 500G", dec!(25)),
        // Unit-only items without weight
        ("GALLETAS CRAKENAS CLUB IND 8*10", dec!(1)),
        ("TOALLA COCINA BCO NUBE", dec!(1)),
        ("SERVILLETA BCA NUBE*300UND", dec!(1)),
    ];

    entries
        .into_iter()
        .map(|(name, factor)| (name.to_string(), factor))
        .collect()
}

/// One catalog presentation with its precomputed match components
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogEntry {
    /// Name exactly as written in the conversion map or override store
    pub canonical_name: String,
    /// Canonical tokens of the name
    pub tokens: BTreeSet<String>,
    /// Core words, measurements and modifiers of the name
    pub components: ComponentSet,
    /// Units per package, or kilograms per sack for bulk goods
    pub factor: Decimal,
}

impl CatalogEntry {
    pub fn new(canonical_name: &str, factor: Decimal) -> Self {
        let description = ProductDescription::new(canonical_name);
        Self {
            canonical_name: canonical_name.to_string(),
            tokens: description.normalized_tokens.into_iter().collect(),
            components: description.components,
            factor,
        }
    }
}

/// Immutable per-batch snapshot of the presentation catalog
#[derive(Debug, Clone)]
pub struct Catalog {
    entries: Vec<CatalogEntry>,
    override_count: usize,
    loaded_at: DateTime<Utc>,
}

impl Catalog {
    /// Build a snapshot from an explicit name → factor map
    pub fn from_factors(factors: BTreeMap<String, Decimal>) -> Self {
        let entries = factors
            .iter()
            .map(|(name, factor)| CatalogEntry::new(name, *factor))
            .collect();
        Self {
            entries,
            override_count: 0,
            loaded_at: Utc::now(),
        }
    }

    /// Snapshot of the built-in conversion map alone
    pub fn builtin() -> Self {
        Self::from_factors(builtin_conversion_map())
    }

    /// Merge the built-in map with the store's overrides into a fresh snapshot
    ///
    /// Store failures never abort the batch: they are logged and the built-in map is used
    /// alone. Overrides with a non-positive factor are skipped.
    pub fn reload(store: Option<&dyn ConversionStore>) -> Self {
        let mut factors = builtin_conversion_map();
        let mut override_count = 0;

        if let Some(store) = store {
            match store.get_all() {
                Ok(overrides) => {
                    for (name, factor) in overrides {
                        if name.trim().is_empty() || factor <= Decimal::ZERO {
                            warn!(
                                product_name = %name,
                                factor = %factor,
                                "Skipping invalid catalog override"
                            );
                            continue;
                        }
                        debug!("Catalog override {} = {}", name, factor);
                        factors.insert(name, factor);
                        override_count += 1;
                    }
                }
                Err(e) => {
                    error_logging::log_catalog_error(&e, "reload_catalog", Some(&store.describe()), None);
                    warn!("Using built-in conversion map only: {}", e);
                }
            }
        }

        let mut catalog = Self::from_factors(factors);
        catalog.override_count = override_count;

        crate::observability::record_catalog_metrics(catalog.len(), override_count);
        info!(
            entries = catalog.len(),
            overrides = override_count,
            "Catalog reloaded"
        );
        catalog
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of entries that came from the override store
    pub fn override_count(&self) -> usize {
        self.override_count
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    /// Exact lookup by canonical name
    pub fn get(&self, canonical_name: &str) -> Option<&CatalogEntry> {
        self.entries
            .iter()
            .find(|entry| entry.canonical_name == canonical_name)
    }

    /// The snapshot as a plain name → factor map
    pub fn factors(&self) -> BTreeMap<String, Decimal> {
        self.entries
            .iter()
            .map(|entry| (entry.canonical_name.clone(), entry.factor))
            .collect()
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Persistence seam for operator-added presentation factors
pub trait ConversionStore: Send + Sync {
    /// Every override, keyed by product name
    fn get_all(&self) -> AppResult<BTreeMap<String, Decimal>>;

    /// Insert or replace one override
    fn upsert(&self, name: &str, factor: Decimal) -> AppResult<()>;

    /// Human-readable location for logs
    fn describe(&self) -> String;
}

fn validate_override(name: &str, factor: Decimal) -> AppResult<String> {
    let trimmed = name.trim();
    let error = if trimmed.is_empty() {
        AppError::Validation("Override product name cannot be empty".to_string())
    } else if factor <= Decimal::ZERO {
        AppError::Validation(format!(
            "Override factor for '{}' must be greater than 0, got {}",
            trimmed, factor
        ))
    } else {
        return Ok(trimmed.to_string());
    };

    error_logging::log_validation_error(&error, "upsert_override", "catalog_override", Some(name));
    Err(error)
}

/// Override store kept in memory, for tests and embedding callers
#[derive(Debug, Default)]
pub struct MemoryConversionStore {
    factors: RwLock<BTreeMap<String, Decimal>>,
}

impl MemoryConversionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_factors(factors: BTreeMap<String, Decimal>) -> Self {
        Self {
            factors: RwLock::new(factors),
        }
    }
}

impl ConversionStore for MemoryConversionStore {
    fn get_all(&self) -> AppResult<BTreeMap<String, Decimal>> {
        Ok(self.factors.read().clone())
    }

    fn upsert(&self, name: &str, factor: Decimal) -> AppResult<()> {
        let name = validate_override(name, factor)?;
        self.factors.write().insert(name, factor);
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

/// Override store persisted as a JSON object `{ "PRODUCT NAME": "24", ... }`
///
/// A missing file reads as an empty store; the file is created on the first upsert.
#[derive(Debug)]
pub struct JsonFileConversionStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileConversionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_factors(&self) -> AppResult<BTreeMap<String, Decimal>> {
        if !self.path.exists() {
            debug!("Override store {} does not exist yet", self.path.display());
            return Ok(BTreeMap::new());
        }

        let content = fs::read_to_string(&self.path).map_err(|e| {
            error_logging::log_filesystem_error(
                &e,
                "read_override_store",
                self.path.to_str(),
                None,
            );
            AppError::from(e)
        })?;

        if content.trim().is_empty() {
            return Ok(BTreeMap::new());
        }

        serde_json::from_str(&content).map_err(|e| {
            AppError::Catalog(format!(
                "Override store '{}' is not a valid name → factor object: {}",
                self.path.display(),
                e
            ))
        })
    }
}

impl ConversionStore for JsonFileConversionStore {
    fn get_all(&self) -> AppResult<BTreeMap<String, Decimal>> {
        self.read_factors()
    }

    fn upsert(&self, name: &str, factor: Decimal) -> AppResult<()> {
        let name = validate_override(name, factor)?;
        let _guard = self.write_lock.lock();

        let mut factors = self.read_factors()?;
        factors.insert(name.clone(), factor);

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        // Write beside the target and rename so readers never see a half-written file
        let staging = self.path.with_extension("json.tmp");
        fs::write(&staging, serde_json::to_string_pretty(&factors)?)?;
        fs::rename(&staging, &self.path)?;

        info!(
            product_name = %name,
            factor = %factor,
            store = %self.path.display(),
            "Catalog override saved"
        );
        Ok(())
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}
