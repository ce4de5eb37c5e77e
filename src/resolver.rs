//! Read-path price resolution
//!
//! Ordered fallback over the cache and the latest raw indicator values.
//! Each tier is attempted only after the prior tier returned nothing
//! usable; callers get a best-effort quote whenever any data exists at any
//! tier, and `NoPriceAvailable` only when none does.

use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::error::EngineError;
use crate::mapper::RuleBook;
use crate::model::{PriceQuote, PriceRecord, PriceSource, Species};
use crate::store::{PriceQuery, PriceStore};

pub struct PriceResolver {
    store: Arc<dyn PriceStore>,
    rules: RuleBook,
    regional_multipliers: HashMap<String, f64>,
}

impl PriceResolver {
    pub fn new(
        store: Arc<dyn PriceStore>,
        rules: RuleBook,
        regional_multipliers: HashMap<String, f64>,
    ) -> Self {
        Self {
            store,
            rules,
            regional_multipliers,
        }
    }

    pub async fn resolve_price(
        &self,
        species: Species,
        category: &str,
        breed: Option<&str>,
        state: Option<&str>,
        saleyard: Option<&str>,
    ) -> Result<PriceQuote, EngineError> {
        let now = chrono::Utc::now();
        self.resolve_price_at(species, category, breed, state, saleyard, now)
            .await
    }

    /// Resolution against an explicit clock, for deterministic tests.
    pub async fn resolve_price_at(
        &self,
        species: Species,
        category: &str,
        breed: Option<&str>,
        state: Option<&str>,
        saleyard: Option<&str>,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Result<PriceQuote, EngineError> {
        // Tier 1: exact category + breed + saleyard.
        if let (Some(breed), Some(saleyard)) = (breed, saleyard) {
            let query = PriceQuery {
                category: category.to_string(),
                breed: Some(breed.to_string()),
                state: None,
                saleyard: Some(saleyard.to_string()),
            };
            if let Some(record) = self.store.query(&query, now).await?.into_iter().next() {
                debug!("Resolved '{}' at tier 1 (exact match)", category);
                return Ok(quote_from(record, PriceSource::ExactMatch));
            }
        }

        // Tier 2: general row at the requested saleyard.
        if let Some(saleyard) = saleyard {
            let query = PriceQuery {
                category: category.to_string(),
                breed: None,
                state: None,
                saleyard: Some(saleyard.to_string()),
            };
            if let Some(record) = self.store.query(&query, now).await?.into_iter().next() {
                debug!("Resolved '{}' at tier 2 (saleyard general)", category);
                return Ok(quote_from(record, PriceSource::SaleyardGeneral));
            }
        }

        // Tier 3: general row at state level.
        if let Some(state) = state {
            let query = PriceQuery {
                category: category.to_string(),
                breed: None,
                state: Some(state.to_string()),
                saleyard: None,
            };
            if let Some(record) = self.store.query(&query, now).await?.into_iter().next() {
                debug!("Resolved '{}' at tier 3 (state general)", category);
                return Ok(quote_from(record, PriceSource::StateGeneral));
            }
        }

        // Tier 4: raw indicator value, regionally scaled. No price-row
        // dependency; works as long as one fetch succeeded within the TTL.
        if let Some(quote) = self.indicator_baseline(species, category, state, now).await? {
            debug!("Resolved '{}' at tier 4 (indicator baseline)", category);
            return Ok(quote);
        }

        debug!("No price available for '{}' at any tier", category);
        Err(EngineError::NoPriceAvailable {
            category: category.to_string(),
        })
    }

    async fn indicator_baseline(
        &self,
        species: Species,
        category: &str,
        state: Option<&str>,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Result<Option<PriceQuote>, EngineError> {
        let Some(rule) = self.rules.rule_for_category(category) else {
            return Ok(None);
        };
        if let Some(rule_species) = rule.conditions.species
            && rule_species != species
        {
            debug!(
                "Category '{}' is a {} category, queried for {}",
                category, rule_species, species
            );
        }

        let Some(snapshot) = self.store.latest_indicator(&rule.indicator, now).await? else {
            return Ok(None);
        };

        let multiplier = state
            .and_then(|s| self.regional_multipliers.get(&s.to_uppercase()))
            .copied()
            .unwrap_or(1.0);

        Ok(Some(PriceQuote {
            category: rule.category.clone(),
            breed: None,
            price: snapshot.value * multiplier,
            unit: snapshot.unit,
            state: state.map(str::to_string),
            saleyard: None,
            as_of: snapshot.as_of,
            source: PriceSource::IndicatorBaseline,
            degraded: true,
        }))
    }
}

fn quote_from(record: PriceRecord, source: PriceSource) -> PriceQuote {
    PriceQuote {
        category: record.category,
        breed: record.breed,
        price: record.final_price,
        unit: record.unit,
        state: record.state,
        saleyard: record.saleyard,
        as_of: record.as_of,
        source,
        degraded: source != PriceSource::ExactMatch,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::indicator::IndicatorSnapshot;
    use crate::model::PriceRecord;
    use crate::store::MemoryStore;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 6, 0, 0).unwrap()
    }

    fn record(
        breed: Option<&str>,
        state: Option<&str>,
        saleyard: Option<&str>,
        final_price: f64,
    ) -> PriceRecord {
        PriceRecord {
            category: "Yearling Steer".to_string(),
            species: Some(Species::Cattle),
            breed: breed.map(str::to_string),
            base_price: 410.0,
            final_price,
            weight_label: None,
            state: state.map(str::to_string),
            saleyard: saleyard.map(str::to_string),
            source: "test".to_string(),
            indicator: "EYCI".to_string(),
            unit: "c/kg cwt".to_string(),
            as_of: now().date_naive(),
            expires_at: now() + Duration::hours(24),
        }
    }

    async fn resolver_with(records: &[PriceRecord]) -> PriceResolver {
        let store = Arc::new(MemoryStore::new());
        store.upsert(records).await.unwrap();
        PriceResolver::new(
            store,
            RuleBook::new(&AppConfig::default_rules()).unwrap(),
            HashMap::new(),
        )
    }

    #[tokio::test]
    async fn test_tier1_exact_match() {
        let resolver = resolver_with(&[
            record(Some("Angus"), Some("NSW"), Some("Wagga Wagga"), 430.5),
            record(None, Some("NSW"), Some("Wagga Wagga"), 410.0),
        ])
        .await;

        let quote = resolver
            .resolve_price_at(
                Species::Cattle,
                "Yearling Steer",
                Some("Angus"),
                Some("NSW"),
                Some("Wagga Wagga"),
                now(),
            )
            .await
            .unwrap();

        assert_eq!(quote.source, PriceSource::ExactMatch);
        assert_eq!(quote.price, 430.5);
        assert!(!quote.degraded);
    }

    #[tokio::test]
    async fn test_tier2_saleyard_general_when_breed_row_missing() {
        let resolver =
            resolver_with(&[record(None, Some("NSW"), Some("Wagga Wagga"), 410.0)]).await;

        let quote = resolver
            .resolve_price_at(
                Species::Cattle,
                "Yearling Steer",
                Some("Angus"),
                Some("NSW"),
                Some("Wagga Wagga"),
                now(),
            )
            .await
            .unwrap();

        assert_eq!(quote.source, PriceSource::SaleyardGeneral);
        assert_eq!(quote.price, 410.0);
        assert!(quote.breed.is_none());
        assert!(quote.degraded);
    }

    #[tokio::test]
    async fn test_tier3_state_general_without_premium() {
        // No saleyard rows at all; the state-level general row answers,
        // with no breed premium applied.
        let resolver = resolver_with(&[record(None, Some("NSW"), None, 390.0)]).await;

        let quote = resolver
            .resolve_price_at(
                Species::Cattle,
                "Yearling Steer",
                Some("Angus"),
                Some("NSW"),
                Some("Wagga Wagga"),
                now(),
            )
            .await
            .unwrap();

        assert_eq!(quote.source, PriceSource::StateGeneral);
        assert_eq!(quote.price, 390.0);
        assert!(quote.breed.is_none());
        assert!(quote.degraded);
    }

    #[tokio::test]
    async fn test_tier4_indicator_baseline_with_regional_multiplier() {
        let store = Arc::new(MemoryStore::new());
        store
            .put_indicator(
                &IndicatorSnapshot {
                    code: "EYCI".to_string(),
                    value: 400.0,
                    unit: "c/kg cwt".to_string(),
                    as_of: now().date_naive(),
                },
                now() + Duration::hours(24),
            )
            .await
            .unwrap();

        let mut multipliers = HashMap::new();
        multipliers.insert("WA".to_string(), 0.96);
        let resolver = PriceResolver::new(
            store,
            RuleBook::new(&AppConfig::default_rules()).unwrap(),
            multipliers,
        );

        let quote = resolver
            .resolve_price_at(
                Species::Cattle,
                "Yearling Steer",
                None,
                Some("WA"),
                None,
                now(),
            )
            .await
            .unwrap();

        assert_eq!(quote.source, PriceSource::IndicatorBaseline);
        assert!((quote.price - 384.0).abs() < 1e-9);
        assert!(quote.degraded);
    }

    #[tokio::test]
    async fn test_expired_rows_fall_through_to_baseline() {
        let store = Arc::new(MemoryStore::new());
        let mut stale = record(None, Some("NSW"), None, 390.0);
        stale.expires_at = now() - Duration::hours(1);
        store.upsert(&[stale]).await.unwrap();
        store
            .put_indicator(
                &IndicatorSnapshot {
                    code: "EYCI".to_string(),
                    value: 400.0,
                    unit: "c/kg cwt".to_string(),
                    as_of: now().date_naive(),
                },
                now() + Duration::hours(24),
            )
            .await
            .unwrap();

        let resolver = PriceResolver::new(
            store,
            RuleBook::new(&AppConfig::default_rules()).unwrap(),
            HashMap::new(),
        );

        let quote = resolver
            .resolve_price_at(
                Species::Cattle,
                "Yearling Steer",
                None,
                Some("NSW"),
                None,
                now(),
            )
            .await
            .unwrap();
        assert_eq!(quote.source, PriceSource::IndicatorBaseline);
    }

    #[tokio::test]
    async fn test_no_price_available_when_everything_empty() {
        let resolver = resolver_with(&[]).await;
        let err = resolver
            .resolve_price_at(
                Species::Cattle,
                "Yearling Steer",
                Some("Angus"),
                Some("NSW"),
                Some("Wagga Wagga"),
                now(),
            )
            .await
            .unwrap_err();
        assert!(err.is_no_price());
    }

    #[tokio::test]
    async fn test_unknown_category_is_no_price_not_panic() {
        let resolver = resolver_with(&[]).await;
        let err = resolver
            .resolve_price_at(Species::Cattle, "Mystery Category", None, None, None, now())
            .await
            .unwrap_err();
        assert!(err.is_no_price());
    }
}
