//! # Unified Application Configuration
//!
//! This module consolidates the conversion engine settings, the catalog override store
//! location and the observability settings into a single configuration object.
//! It supports loading from environment variables, validation, and a log-safe summary.

use crate::catalog_matcher::{MatchWeights, MATCH_THRESHOLD};
use crate::errors::{AppError, AppResult};
use crate::observability_config::ObservabilityConfig;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

/// Density used to turn cc into grams when nothing better is known
pub const DEFAULT_VOLUME_DENSITY: Decimal = dec!(1);
/// Kilograms assumed for a bulk sack with no catalog entry
pub const DEFAULT_BULK_KG: Decimal = dec!(50);
/// Presentation used when no catalog entry matches
pub const DEFAULT_PRESENTATION: Decimal = dec!(1);

/// Conversion engine settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Minimum final score for a catalog match
    pub match_threshold: f64,
    /// Weighting of core, measurement and modifier scores
    pub weights: MatchWeights,
    /// Grams per cc for volume-labelled products
    pub volume_density: Decimal,
    /// Kilograms per unmatched bulk sack
    pub bulk_default_kg: Decimal,
    /// Presentation substituted when no catalog entry matches
    pub default_presentation: Decimal,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            match_threshold: MATCH_THRESHOLD,
            weights: MatchWeights::default(),
            volume_density: DEFAULT_VOLUME_DENSITY,
            bulk_default_kg: DEFAULT_BULK_KG,
            default_presentation: DEFAULT_PRESENTATION,
        }
    }
}

impl EngineConfig {
    /// Validate engine configuration
    pub fn validate(&self) -> AppResult<()> {
        if !(0.0..=1.0).contains(&self.match_threshold) {
            return Err(AppError::Config(format!(
                "Match threshold must be between 0.0 and 1.0, got {}",
                self.match_threshold
            )));
        }

        self.weights.validate()?;

        if self.volume_density <= Decimal::ZERO {
            return Err(AppError::Config(
                "Volume density must be greater than 0".to_string(),
            ));
        }

        if self.bulk_default_kg <= Decimal::ZERO {
            return Err(AppError::Config(
                "Bulk default kilograms must be greater than 0".to_string(),
            ));
        }

        if self.default_presentation <= Decimal::ZERO {
            return Err(AppError::Config(
                "Default presentation must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

/// Catalog override store settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// JSON file holding operator-added presentation factors
    pub overrides_path: Option<PathBuf>,
}

impl CatalogConfig {
    /// Validate catalog configuration
    pub fn validate(&self) -> AppResult<()> {
        if let Some(path) = &self.overrides_path {
            if path.as_os_str().is_empty() {
                return Err(AppError::Config(
                    "Catalog overrides path cannot be empty".to_string(),
                ));
            }
            if path.is_dir() {
                return Err(AppError::Config(format!(
                    "Catalog overrides path '{}' is a directory",
                    path.display()
                )));
            }
        }
        Ok(())
    }
}

fn parse_env<T: FromStr>(key: &str, default: &str) -> AppResult<T> {
    env::var(key)
        .unwrap_or_else(|_| default.to_string())
        .trim()
        .parse()
        .map_err(|_| AppError::Config(format!("{} must be a valid number", key)))
}

/// Unified application configuration
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    /// Conversion engine configuration
    pub engine: EngineConfig,
    /// Catalog override store configuration
    pub catalog: CatalogConfig,
    /// Observability configuration
    pub observability: ObservabilityConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> AppResult<Self> {
        let mut config = Self::default();

        // Engine configuration
        config.engine.match_threshold = parse_env("MATCH_THRESHOLD", "0.70")?;
        config.engine.volume_density = parse_env("VOLUME_DENSITY", "1")?;
        config.engine.bulk_default_kg = parse_env("BULK_DEFAULT_KG", "50")?;
        config.engine.default_presentation = parse_env("DEFAULT_PRESENTATION", "1")?;

        // Catalog configuration
        config.catalog.overrides_path = env::var("CATALOG_OVERRIDES_PATH")
            .ok()
            .filter(|path| !path.trim().is_empty())
            .map(PathBuf::from);

        // Observability configuration
        config.observability = ObservabilityConfig::from_env();

        Ok(config)
    }

    /// Validate all configuration sections
    pub fn validate(&self) -> AppResult<()> {
        self.engine.validate()?;
        self.catalog.validate()?;
        self.observability.validate()?;
        Ok(())
    }

    /// Get a summary of the current configuration for logging
    pub fn summary(&self) -> String {
        format!(
            "Configuration: match_threshold={}, volume_density={}, bulk_default_kg={}, default_presentation={}, overrides={}, environment={}",
            self.engine.match_threshold,
            self.engine.volume_density,
            self.engine.bulk_default_kg,
            self.engine.default_presentation,
            self.catalog
                .overrides_path
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "none".to_string()),
            self.observability.environment
        )
    }
}
