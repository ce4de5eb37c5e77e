//! Durable price cache
//!
//! `FjallStore` is the production store (one keyspace under the data dir,
//! partitions for price rows and indicator snapshots); `MemoryStore` backs
//! tests and ephemeral runs. Both answer queries most-location-specific
//! first and never return expired rows.

pub mod disk;
pub mod memory;

pub use disk::FjallStore;
pub use memory::MemoryStore;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::indicator::IndicatorSnapshot;
use crate::model::PriceRecord;

/// Filter for a cache read. `None` fields relax the corresponding
/// constraint, except `breed`: `None` selects the general rows.
#[derive(Debug, Clone, Default)]
pub struct PriceQuery {
    pub category: String,
    pub breed: Option<String>,
    pub state: Option<String>,
    pub saleyard: Option<String>,
}

#[async_trait]
pub trait PriceStore: Send + Sync {
    /// Insert-or-overwrite by unique key. Returns the number of distinct
    /// keys written; re-running with identical records must not grow the
    /// store.
    async fn upsert(&self, records: &[PriceRecord]) -> Result<usize>;

    /// Non-expired rows matching the filter, most location-specific first,
    /// then newest as-of date first.
    async fn query(&self, query: &PriceQuery, now: DateTime<Utc>) -> Result<Vec<PriceRecord>>;

    /// Deletes exactly the rows with `expires_at <= now`; returns the count.
    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize>;

    async fn record_count(&self) -> Result<usize>;

    /// Persists the latest successful snapshot of an indicator, used by the
    /// resolver's baseline tier.
    async fn put_indicator(
        &self,
        snapshot: &IndicatorSnapshot,
        expires_at: DateTime<Utc>,
    ) -> Result<()>;

    /// The most recent non-expired snapshot for an indicator code.
    async fn latest_indicator(
        &self,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<IndicatorSnapshot>>;
}

/// Shared filter semantics for both store implementations.
pub(crate) fn record_matches(record: &PriceRecord, query: &PriceQuery, now: DateTime<Utc>) -> bool {
    if record.is_expired(now) {
        return false;
    }
    if !record.category.eq_ignore_ascii_case(&query.category) {
        return false;
    }
    match &query.breed {
        Some(breed) => {
            if !record
                .breed
                .as_deref()
                .is_some_and(|b| b.eq_ignore_ascii_case(breed))
            {
                return false;
            }
        }
        None => {
            if record.breed.is_some() {
                return false;
            }
        }
    }
    if let Some(saleyard) = &query.saleyard {
        return record
            .saleyard
            .as_deref()
            .is_some_and(|s| s.eq_ignore_ascii_case(saleyard));
    }
    if let Some(state) = &query.state {
        // State-level reads want the state's general row, not some
        // saleyard's row within the state.
        return record.saleyard.is_none()
            && record
                .state
                .as_deref()
                .is_some_and(|s| s.eq_ignore_ascii_case(state));
    }
    true
}

pub(crate) fn sort_results(records: &mut [PriceRecord]) {
    records.sort_by(|a, b| {
        b.specificity()
            .cmp(&a.specificity())
            .then(b.as_of.cmp(&a.as_of))
    });
}
