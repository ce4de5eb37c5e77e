use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fjall::{Config, Keyspace, PartitionCreateOptions, PartitionHandle, PersistMode};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use tracing::debug;

use super::{PriceQuery, PriceStore, record_matches, sort_results};
use crate::indicator::IndicatorSnapshot;
use crate::model::{PriceKey, PriceRecord};

#[derive(Serialize, Deserialize)]
struct IndicatorEntry {
    snapshot: IndicatorSnapshot,
    expires_at: DateTime<Utc>,
}

/// Durable store over a fjall keyspace: one partition of price rows keyed
/// by the record's unique key, one of latest indicator snapshots.
pub struct FjallStore {
    keyspace: Keyspace,
    prices: PartitionHandle,
    indicators: PartitionHandle,
}

impl FjallStore {
    pub fn open(data_path: &Path) -> Result<Self> {
        std::fs::create_dir_all(data_path)?;

        let keyspace = Config::new(data_path.join("cache")).open()?;
        let prices = keyspace.open_partition("prices", PartitionCreateOptions::default())?;
        let indicators = keyspace.open_partition("indicators", PartitionCreateOptions::default())?;
        Ok(Self {
            keyspace,
            prices,
            indicators,
        })
    }
}

#[async_trait]
impl PriceStore for FjallStore {
    async fn upsert(&self, records: &[PriceRecord]) -> Result<usize> {
        let mut keys = HashSet::new();
        let mut batch = self.keyspace.batch();
        for record in records {
            let key = record.key().encode();
            batch.insert(&self.prices, key.clone(), serde_json::to_vec(record)?);
            keys.insert(key);
        }
        // One atomic commit per cycle; readers see all of its rows or none.
        batch.commit()?;
        self.keyspace.persist(PersistMode::SyncAll)?;
        debug!("Upserted {} records", keys.len());
        Ok(keys.len())
    }

    async fn query(&self, query: &PriceQuery, now: DateTime<Utc>) -> Result<Vec<PriceRecord>> {
        let prefix = PriceKey::category_prefix(&query.category);
        let mut results = Vec::new();
        for item in self.prices.prefix(prefix.as_bytes()) {
            let (_key, value) = item?;
            let record: PriceRecord = serde_json::from_slice(&value)?;
            if record_matches(&record, query, now) {
                results.push(record);
            }
        }
        sort_results(&mut results);
        debug!(
            "Query for '{}' returned {} row(s)",
            query.category,
            results.len()
        );
        Ok(results)
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize> {
        let mut expired_keys = Vec::new();
        for item in self.prices.iter() {
            let (key, value) = item?;
            let record: PriceRecord = serde_json::from_slice(&value)?;
            if record.is_expired(now) {
                expired_keys.push(key);
            }
        }
        let purged = expired_keys.len();
        for key in expired_keys {
            self.prices.remove(key)?;
        }

        let mut stale_indicators = Vec::new();
        for item in self.indicators.iter() {
            let (key, value) = item?;
            let entry: IndicatorEntry = serde_json::from_slice(&value)?;
            if entry.expires_at <= now {
                stale_indicators.push(key);
            }
        }
        for key in stale_indicators {
            self.indicators.remove(key)?;
        }

        self.keyspace.persist(PersistMode::SyncAll)?;
        debug!("Purged {} expired price row(s)", purged);
        Ok(purged)
    }

    async fn record_count(&self) -> Result<usize> {
        Ok(self.prices.len()?)
    }

    async fn put_indicator(
        &self,
        snapshot: &IndicatorSnapshot,
        expires_at: DateTime<Utc>,
    ) -> Result<()> {
        let entry = IndicatorEntry {
            snapshot: snapshot.clone(),
            expires_at,
        };
        self.indicators
            .insert(snapshot.code.to_lowercase(), serde_json::to_vec(&entry)?)?;
        self.keyspace.persist(PersistMode::SyncAll)?;
        Ok(())
    }

    async fn latest_indicator(
        &self,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<IndicatorSnapshot>> {
        let Some(value) = self.indicators.get(code.to_lowercase())? else {
            return Ok(None);
        };
        let entry: IndicatorEntry = serde_json::from_slice(&value)?;
        if entry.expires_at <= now {
            debug!("Indicator snapshot expired for code: {}", code);
            return Ok(None);
        }
        Ok(Some(entry.snapshot))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Species;
    use chrono::{Duration, TimeZone};
    use tempfile::tempdir;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 6, 0, 0).unwrap()
    }

    fn record(
        category: &str,
        breed: Option<&str>,
        saleyard: Option<&str>,
        expires_at: DateTime<Utc>,
    ) -> PriceRecord {
        PriceRecord {
            category: category.to_string(),
            species: Some(Species::Cattle),
            breed: breed.map(str::to_string),
            base_price: 410.0,
            final_price: 410.0,
            weight_label: None,
            state: Some("NSW".to_string()),
            saleyard: saleyard.map(str::to_string),
            source: "test".to_string(),
            indicator: "EYCI".to_string(),
            unit: "c/kg cwt".to_string(),
            as_of: now().date_naive(),
            expires_at,
        }
    }

    #[tokio::test]
    async fn test_upsert_query_roundtrip() {
        let dir = tempdir().unwrap();
        let store = FjallStore::open(dir.path()).unwrap();
        let expiry = now() + Duration::hours(24);

        store
            .upsert(&[
                record("Yearling Steer", None, None, expiry),
                record("Yearling Steer", Some("Angus"), Some("Wagga Wagga"), expiry),
                record("Trade Lamb", None, None, expiry),
            ])
            .await
            .unwrap();

        let query = PriceQuery {
            category: "Yearling Steer".to_string(),
            breed: Some("Angus".to_string()),
            state: None,
            saleyard: Some("Wagga Wagga".to_string()),
        };
        let results = store.query(&query, now()).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].breed.as_deref(), Some("Angus"));

        // Prefix scan does not leak other categories.
        let query = PriceQuery {
            category: "Trade Lamb".to_string(),
            ..Default::default()
        };
        let results = store.query(&query, now()).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].category, "Trade Lamb");
    }

    #[tokio::test]
    async fn test_upsert_overwrites_same_key() {
        let dir = tempdir().unwrap();
        let store = FjallStore::open(dir.path()).unwrap();
        let expiry = now() + Duration::hours(24);

        let mut row = record("Yearling Steer", None, None, expiry);
        store.upsert(std::slice::from_ref(&row)).await.unwrap();
        row.final_price = 420.0;
        store.upsert(std::slice::from_ref(&row)).await.unwrap();

        assert_eq!(store.record_count().await.unwrap(), 1);
        let query = PriceQuery {
            category: "Yearling Steer".to_string(),
            state: Some("NSW".to_string()),
            ..Default::default()
        };
        let results = store.query(&query, now()).await.unwrap();
        assert_eq!(results[0].final_price, 420.0);
    }

    #[tokio::test]
    async fn test_duplicate_keys_in_one_batch_count_once() {
        let dir = tempdir().unwrap();
        let store = FjallStore::open(dir.path()).unwrap();
        let expiry = now() + Duration::hours(24);

        let row = record("Yearling Steer", None, None, expiry);
        let mut newer = row.clone();
        newer.final_price = 420.0;

        // Colliding keys within one batch: last writer wins, counted once.
        let written = store.upsert(&[row, newer]).await.unwrap();
        assert_eq!(written, 1);
        assert_eq!(store.record_count().await.unwrap(), 1);

        let query = PriceQuery {
            category: "Yearling Steer".to_string(),
            state: Some("NSW".to_string()),
            ..Default::default()
        };
        let results = store.query(&query, now()).await.unwrap();
        assert_eq!(results[0].final_price, 420.0);
    }

    #[tokio::test]
    async fn test_purge_removes_exactly_expired_rows() {
        let dir = tempdir().unwrap();
        let store = FjallStore::open(dir.path()).unwrap();

        store
            .upsert(&[
                record("Yearling Steer", None, None, now() - Duration::hours(1)),
                record("Yearling Steer", Some("Angus"), None, now()),
                record("Trade Lamb", None, None, now() + Duration::hours(23)),
            ])
            .await
            .unwrap();

        let purged = store.purge_expired(now()).await.unwrap();
        assert_eq!(purged, 2);
        assert_eq!(store.record_count().await.unwrap(), 1);

        let query = PriceQuery {
            category: "Trade Lamb".to_string(),
            state: Some("NSW".to_string()),
            ..Default::default()
        };
        assert_eq!(store.query(&query, now()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_rows_survive_reopen() {
        let dir = tempdir().unwrap();
        let expiry = now() + Duration::hours(24);
        {
            let store = FjallStore::open(dir.path()).unwrap();
            store
                .upsert(&[record("Yearling Steer", None, None, expiry)])
                .await
                .unwrap();
        }

        let store = FjallStore::open(dir.path()).unwrap();
        assert_eq!(store.record_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_indicator_snapshot_expiry() {
        let dir = tempdir().unwrap();
        let store = FjallStore::open(dir.path()).unwrap();
        let snapshot = IndicatorSnapshot {
            code: "EYCI".to_string(),
            value: 410.25,
            unit: "c/kg cwt".to_string(),
            as_of: now().date_naive(),
        };

        store
            .put_indicator(&snapshot, now() + Duration::hours(24))
            .await
            .unwrap();
        assert_eq!(
            store.latest_indicator("EYCI", now()).await.unwrap(),
            Some(snapshot)
        );
        assert!(
            store
                .latest_indicator("EYCI", now() + Duration::hours(25))
                .await
                .unwrap()
                .is_none()
        );
    }
}
