//! Batch price generation
//!
//! Cross-produces fetched indicators x matching rules x configured
//! locations into concrete `PriceRecord`s: one general row per location
//! plus one row per breed with an applicable premium. Pure; the batch
//! runner owns fetching and persistence.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use std::collections::HashSet;
use tracing::{debug, warn};

use crate::indicator::IndicatorSnapshot;
use crate::mapper::RuleBook;
use crate::model::{Location, MappingRule, PriceRecord, Species};
use crate::premium::PremiumBook;

/// Source label stamped on general (no premium) rows.
const INDICATOR_SOURCE: &str = "mla_indicator";

pub fn generate(
    snapshots: &[IndicatorSnapshot],
    rules: &RuleBook,
    premiums: &PremiumBook,
    locations: &[Location],
    as_of: NaiveDate,
    ttl: Duration,
) -> Vec<PriceRecord> {
    // Expiry is anchored to the as-of date, not the batch start, so a
    // same-day rerun stamps identical rows.
    let expires_at = as_of.and_time(NaiveTime::MIN).and_utc() + ttl;
    let mut records = Vec::new();

    for snapshot in snapshots {
        let matching = rules.rules_for_indicator(&snapshot.code);
        if matching.is_empty() {
            warn!(
                "Indicator {} matched no active rule; no records this cycle",
                snapshot.code
            );
            continue;
        }

        for rule in matching {
            for location in locations {
                records.push(general_record(snapshot, rule, location, as_of, expires_at));
                records.extend(breed_records(
                    snapshot, rule, premiums, location, as_of, expires_at,
                ));
            }
        }
    }

    debug!(
        "Generated {} price records from {} indicator(s)",
        records.len(),
        snapshots.len()
    );
    records
}

fn general_record(
    snapshot: &IndicatorSnapshot,
    rule: &MappingRule,
    location: &Location,
    as_of: NaiveDate,
    expires_at: DateTime<Utc>,
) -> PriceRecord {
    PriceRecord {
        category: rule.category.clone(),
        species: rule.conditions.species,
        breed: None,
        base_price: snapshot.value,
        final_price: snapshot.value,
        weight_label: rule.conditions.weight_label(),
        state: location.state.clone(),
        saleyard: location.saleyard.clone(),
        source: INDICATOR_SOURCE.to_string(),
        indicator: snapshot.code.clone(),
        unit: snapshot.unit.clone(),
        as_of,
        expires_at,
    }
}

fn breed_records(
    snapshot: &IndicatorSnapshot,
    rule: &MappingRule,
    premiums: &PremiumBook,
    location: &Location,
    as_of: NaiveDate,
    expires_at: DateTime<Utc>,
) -> Vec<PriceRecord> {
    // Distinct breeds defined for this category, species-compatible with
    // the rule when the rule declares a species.
    let mut seen: HashSet<(Species, String)> = HashSet::new();
    let mut records = Vec::new();

    for premium in premiums.for_category(&rule.category) {
        if let Some(species) = rule.conditions.species
            && premium.species != species
        {
            continue;
        }
        if !seen.insert((premium.species, premium.breed.to_lowercase())) {
            continue;
        }

        // The single most specific premium covering this location; breeds
        // whose premiums are scoped elsewhere produce no row here.
        let Some(best) = premiums.best(
            premium.species,
            &premium.breed,
            &rule.category,
            location.state.as_deref(),
            location.saleyard.as_deref(),
        ) else {
            continue;
        };

        let final_price = snapshot.value * (1.0 + best.premium_pct / 100.0);
        records.push(PriceRecord {
            category: rule.category.clone(),
            species: Some(best.species),
            breed: Some(best.breed.clone()),
            base_price: snapshot.value,
            final_price,
            weight_label: rule.conditions.weight_label(),
            state: location.state.clone(),
            saleyard: location.saleyard.clone(),
            source: best.source.clone(),
            indicator: snapshot.code.clone(),
            unit: snapshot.unit.clone(),
            as_of,
            expires_at,
        });
    }

    records
}
