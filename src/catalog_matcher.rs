//! # Catalog Matcher
//!
//! Fuzzy-matches a product's components against every catalog entry.
//!
//! ## Scoring
//!
//! ```text
//! core_score        = |core ∩ catCore| / min(|core|, |catCore|)     (0 overlap → entry skipped)
//! measurement_score = 1.0  both sides sized and sizes intersect     tier Exact
//!                     1.0  catalog entry has no size at all         tier Category
//!                     0.5  input unsized, catalog entry sized       tier Partial
//!                     0.2  both sized, sizes differ                 tier DifferentSize
//! modifier_score    = 1.0 neither side has modifiers, overlap ratio when both do,
//!                     0.5 when only one side does
//! final_score       = 0.60·core + 0.30·measurement + 0.10·modifier
//! ```
//!
//! ## Selection
//!
//! Bulk and packaged products never match each other. Candidates under the acceptance
//! threshold are discarded. Among the rest the tier dominates the score: the best `Exact`
//! candidate wins over any `Category` candidate, which wins over any other tier. Equal tier and score keep the first entry in catalog
//! order. No candidate left means no match, never a weak guess.

use crate::catalog::{Catalog, CatalogEntry};
use crate::components::ComponentSet;
use crate::errors::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{debug, trace};

pub const CORE_WEIGHT: f64 = 0.60;
pub const MEASUREMENT_WEIGHT: f64 = 0.30;
pub const MODIFIER_WEIGHT: f64 = 0.10;
/// Minimum final score for a catalog match to be accepted
pub const MATCH_THRESHOLD: f64 = 0.70;

// Weighted sums such as 0.6 + 0.3 + 0.1 do not land exactly on 1.0 in binary floating point
const SCORE_EPSILON: f64 = 1e-9;

/// Relative weight of each component score in the final score
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MatchWeights {
    pub core: f64,
    pub measurement: f64,
    pub modifier: f64,
}

impl Default for MatchWeights {
    fn default() -> Self {
        Self {
            core: CORE_WEIGHT,
            measurement: MEASUREMENT_WEIGHT,
            modifier: MODIFIER_WEIGHT,
        }
    }
}

impl MatchWeights {
    /// Validate that the weights are non-negative and sum to 1
    pub fn validate(&self) -> AppResult<()> {
        for (name, weight) in [
            ("core", self.core),
            ("measurement", self.measurement),
            ("modifier", self.modifier),
        ] {
            if !weight.is_finite() || weight < 0.0 {
                return Err(AppError::Config(format!(
                    "{} weight must be a non-negative number, got {}",
                    name, weight
                )));
            }
        }

        let sum = self.core + self.measurement + self.modifier;
        if (sum - 1.0).abs() > 1e-6 {
            return Err(AppError::Config(format!(
                "Match weights must sum to 1.0, got {}",
                sum
            )));
        }
        Ok(())
    }
}

/// How the sizes of the input and the catalog entry relate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchTier {
    Exact,
    Category,
    Partial,
    DifferentSize,
}

impl MatchTier {
    /// Selection priority; a higher rank always wins regardless of score
    pub fn rank(self) -> u8 {
        match self {
            MatchTier::Exact => 2,
            MatchTier::Category => 1,
            MatchTier::Partial | MatchTier::DifferentSize => 0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MatchTier::Exact => "exact",
            MatchTier::Category => "category",
            MatchTier::Partial => "partial",
            MatchTier::DifferentSize => "different_size",
        }
    }
}

/// Component scores of one input/entry pair
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub core_score: f64,
    pub measurement_score: f64,
    pub modifier_score: f64,
    pub final_score: f64,
    pub tier: MatchTier,
}

/// An accepted catalog match
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CatalogMatch<'a> {
    pub entry: &'a CatalogEntry,
    pub score: ScoreBreakdown,
}

impl CatalogMatch<'_> {
    pub fn tier(&self) -> MatchTier {
        self.score.tier
    }

    pub fn final_score(&self) -> f64 {
        self.score.final_score
    }
}

fn overlap_ratio(left: &BTreeSet<String>, right: &BTreeSet<String>) -> f64 {
    let shared = left.intersection(right).count();
    let smaller = left.len().min(right.len());
    if smaller == 0 {
        0.0
    } else {
        shared as f64 / smaller as f64
    }
}

fn measurement_score(input: &BTreeSet<String>, catalog: &BTreeSet<String>) -> (f64, MatchTier) {
    match (input.is_empty(), catalog.is_empty()) {
        (false, false) if input.intersection(catalog).next().is_some() => (1.0, MatchTier::Exact),
        (false, false) => (0.2, MatchTier::DifferentSize),
        (_, true) => (1.0, MatchTier::Category),
        (true, false) => (0.5, MatchTier::Partial),
    }
}

fn modifier_score(input: &BTreeSet<String>, catalog: &BTreeSet<String>) -> f64 {
    match (input.is_empty(), catalog.is_empty()) {
        (true, true) => 1.0,
        (false, false) => overlap_ratio(input, catalog),
        _ => 0.5,
    }
}

/// Score one catalog entry, or `None` when the core words share nothing
pub fn score_components(
    input: &ComponentSet,
    entry: &ComponentSet,
    weights: &MatchWeights,
) -> Option<ScoreBreakdown> {
    if input.core_words.is_empty() || entry.core_words.is_empty() {
        return None;
    }
    if input.core_words.is_disjoint(&entry.core_words) {
        return None;
    }

    let core_score = overlap_ratio(&input.core_words, &entry.core_words);
    let (measurement_score, tier) = measurement_score(&input.measurements, &entry.measurements);
    let modifier_score = modifier_score(&input.modifiers, &entry.modifiers);

    let final_score = weights.core * core_score
        + weights.measurement * measurement_score
        + weights.modifier * modifier_score;

    Some(ScoreBreakdown {
        core_score,
        measurement_score,
        modifier_score,
        final_score,
        tier,
    })
}

/// Scores inputs against a catalog snapshot and applies the selection rule
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CatalogMatcher {
    weights: MatchWeights,
    threshold: f64,
}

impl Default for CatalogMatcher {
    fn default() -> Self {
        Self {
            weights: MatchWeights::default(),
            threshold: MATCH_THRESHOLD,
        }
    }
}

impl CatalogMatcher {
    pub fn new(weights: MatchWeights, threshold: f64) -> Self {
        Self { weights, threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    fn accepts(&self, score: &ScoreBreakdown) -> bool {
        score.final_score + SCORE_EPSILON >= self.threshold
    }

    /// Every entry sharing a core word with the input, scored, in catalog order
    ///
    /// Bulk inputs only see bulk entries and packaged inputs only packaged ones: a sack
    /// factor is kilograms, a package factor is a unit count.
    pub fn candidates<'a>(&self, input: &ComponentSet, catalog: &'a Catalog) -> Vec<CatalogMatch<'a>> {
        let bulk = input.is_bulk();
        catalog
            .entries()
            .iter()
            .filter(|entry| entry.components.is_bulk() == bulk)
            .filter_map(|entry| {
                score_components(input, &entry.components, &self.weights)
                    .map(|score| CatalogMatch { entry, score })
            })
            .collect()
    }

    /// Best accepted match for the input, or `None`
    pub fn find_best<'a>(&self, input: &ComponentSet, catalog: &'a Catalog) -> Option<CatalogMatch<'a>> {
        if !input.is_matchable() {
            debug!("Input has no core words, skipping catalog match");
            return None;
        }

        let mut best: Option<CatalogMatch<'a>> = None;

        for candidate in self.candidates(input, catalog) {
            trace!(
                entry = %candidate.entry.canonical_name,
                score = candidate.score.final_score,
                tier = candidate.score.tier.as_str(),
                "Scored catalog candidate"
            );

            if !self.accepts(&candidate.score) {
                continue;
            }

            let replaces = match &best {
                None => true,
                Some(current) => {
                    let (rank, current_rank) = (candidate.tier().rank(), current.tier().rank());
                    rank > current_rank
                        || (rank == current_rank
                            && candidate.final_score() > current.final_score() + SCORE_EPSILON)
                }
            };
            if replaces {
                best = Some(candidate);
            }
        }

        match &best {
            Some(found) => debug!(
                entry = %found.entry.canonical_name,
                factor = %found.entry.factor,
                score = found.score.final_score,
                tier = found.score.tier.as_str(),
                "Catalog match selected"
            ),
            None => debug!("No catalog entry reached threshold {}", self.threshold),
        }
        best
    }
}
