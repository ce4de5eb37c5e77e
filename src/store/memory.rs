use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::RwLock;
use tracing::debug;

use super::{PriceQuery, PriceStore, record_matches, sort_results};
use crate::indicator::IndicatorSnapshot;
use crate::model::PriceRecord;

/// In-memory store for tests and ephemeral runs.
#[derive(Default)]
pub struct MemoryStore {
    prices: RwLock<HashMap<String, PriceRecord>>,
    indicators: RwLock<HashMap<String, (IndicatorSnapshot, DateTime<Utc>)>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PriceStore for MemoryStore {
    async fn upsert(&self, records: &[PriceRecord]) -> Result<usize> {
        let mut prices = self.prices.write().unwrap();
        let mut keys = HashSet::new();
        for record in records {
            let key = record.key().encode();
            prices.insert(key.clone(), record.clone());
            keys.insert(key);
        }
        debug!("Upserted {} records", keys.len());
        Ok(keys.len())
    }

    async fn query(&self, query: &PriceQuery, now: DateTime<Utc>) -> Result<Vec<PriceRecord>> {
        let prices = self.prices.read().unwrap();
        let mut results: Vec<PriceRecord> = prices
            .values()
            .filter(|record| record_matches(record, query, now))
            .cloned()
            .collect();
        sort_results(&mut results);
        Ok(results)
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize> {
        let mut prices = self.prices.write().unwrap();
        let before = prices.len();
        prices.retain(|_, record| !record.is_expired(now));
        let purged = before - prices.len();

        let mut indicators = self.indicators.write().unwrap();
        indicators.retain(|_, (_, expires_at)| *expires_at > now);

        Ok(purged)
    }

    async fn record_count(&self) -> Result<usize> {
        Ok(self.prices.read().unwrap().len())
    }

    async fn put_indicator(
        &self,
        snapshot: &IndicatorSnapshot,
        expires_at: DateTime<Utc>,
    ) -> Result<()> {
        let mut indicators = self.indicators.write().unwrap();
        indicators.insert(snapshot.code.to_lowercase(), (snapshot.clone(), expires_at));
        Ok(())
    }

    async fn latest_indicator(
        &self,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<IndicatorSnapshot>> {
        let indicators = self.indicators.read().unwrap();
        Ok(indicators
            .get(&code.to_lowercase())
            .filter(|(_, expires_at)| *expires_at > now)
            .map(|(snapshot, _)| snapshot.clone()))
    }
}
