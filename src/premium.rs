//! Breed premium resolution
//!
//! Premiums are grouped by category at construction so the generator's
//! category x location x breed loop never rescans the full table.

use std::collections::HashMap;

use crate::model::{BreedPremium, Species};

pub struct PremiumBook {
    by_category: HashMap<String, Vec<BreedPremium>>,
}

/// Scope rank: saleyard-scoped beats state-scoped beats national.
fn specificity(premium: &BreedPremium) -> u8 {
    if premium.saleyard.is_some() {
        2
    } else if premium.state.is_some() {
        1
    } else {
        0
    }
}

/// True when the premium's scope covers the queried location. A
/// saleyard-scoped premium needs that exact saleyard; a state-scoped one
/// needs that state; a national premium applies everywhere.
fn applies_at(premium: &BreedPremium, state: Option<&str>, saleyard: Option<&str>) -> bool {
    match (&premium.saleyard, &premium.state) {
        (Some(scope), _) => saleyard.is_some_and(|s| scope.eq_ignore_ascii_case(s)),
        (None, Some(scope)) => state.is_some_and(|s| scope.eq_ignore_ascii_case(s)),
        (None, None) => true,
    }
}

impl PremiumBook {
    pub fn new(premiums: &[BreedPremium]) -> Self {
        let mut by_category: HashMap<String, Vec<BreedPremium>> = HashMap::new();
        for premium in premiums.iter().filter(|p| p.active) {
            by_category
                .entry(premium.category.to_lowercase())
                .or_default()
                .push(premium.clone());
        }
        PremiumBook { by_category }
    }

    /// Active premiums defined for a category, any breed and scope.
    pub fn for_category(&self, category: &str) -> &[BreedPremium] {
        self.by_category
            .get(&category.to_lowercase())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// The single most specific premium covering the queried breed and
    /// location, or `None`. Equal specificity is broken by highest
    /// confidence; a full tie keeps the first configured entry.
    pub fn best(
        &self,
        species: Species,
        breed: &str,
        category: &str,
        state: Option<&str>,
        saleyard: Option<&str>,
    ) -> Option<&BreedPremium> {
        let mut best: Option<&BreedPremium> = None;
        for candidate in self
            .for_category(category)
            .iter()
            .filter(|p| p.species == species && p.breed.eq_ignore_ascii_case(breed))
            .filter(|p| applies_at(p, state, saleyard))
        {
            // Strictly-greater comparison: ties keep the incumbent.
            let better = best.is_none_or(|b| {
                specificity(candidate)
                    .cmp(&specificity(b))
                    .then(candidate.confidence.total_cmp(&b.confidence))
                    .is_gt()
            });
            if better {
                best = Some(candidate);
            }
        }
        best
    }

    /// Premium percentage for the query; 0.0 (not an error) when the breed
    /// is unknown or nothing applies. Premiums are not cumulative.
    pub fn resolve(
        &self,
        species: Species,
        breed: &str,
        category: &str,
        state: Option<&str>,
        saleyard: Option<&str>,
    ) -> f64 {
        self.best(species, breed, category, state, saleyard)
            .map(|p| p.premium_pct)
            .unwrap_or(0.0)
    }
}
