//! Upstream market indicator abstractions

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A fetched value of a published market indicator, e.g. EYCI at
/// 410.25 c/kg cwt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSnapshot {
    pub code: String,
    pub value: f64,
    pub unit: String,
    pub as_of: NaiveDate,
}

/// Injectable client for the upstream market-data provider.
#[async_trait]
pub trait IndicatorProvider: Send + Sync {
    async fn fetch_indicator(&self, code: &str) -> Result<IndicatorSnapshot>;
}
