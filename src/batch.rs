//! Batch generation and scheduling
//!
//! One runner owns the write path: fetch indicators, generate records,
//! upsert, purge. A `try_lock` on the run lock keeps cycles single-flight;
//! overlapping triggers are reported as skipped rather than interleaving
//! upserts on the same keys. Rules and premiums are snapshotted once per
//! cycle so every record sees one consistent configuration view.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::config::AppConfig;
use crate::error::EngineError;
use crate::generator::generate;
use crate::indicator::{IndicatorProvider, IndicatorSnapshot};
use crate::mapper::RuleBook;
use crate::premium::PremiumBook;
use crate::providers::util::with_retry;
use crate::store::PriceStore;

#[derive(Debug, Default, Clone)]
pub struct BatchSummary {
    pub fetched: Vec<String>,
    pub failed: Vec<String>,
    pub records_written: usize,
    pub purged: usize,
    /// True when another run held the lock and this one did nothing.
    pub skipped: bool,
    /// True when a shutdown signal interrupted the fetch loop.
    pub cancelled: bool,
}

pub struct BatchRunner {
    provider: Arc<dyn IndicatorProvider>,
    store: Arc<dyn PriceStore>,
    config: AppConfig,
    run_lock: tokio::sync::Mutex<()>,
}

impl BatchRunner {
    pub fn new(
        provider: Arc<dyn IndicatorProvider>,
        store: Arc<dyn PriceStore>,
        config: AppConfig,
    ) -> Self {
        Self {
            provider,
            store,
            config,
            run_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub async fn run_once(&self, shutdown: Option<&watch::Receiver<bool>>) -> Result<BatchSummary> {
        self.run_once_at(Utc::now(), shutdown).await
    }

    /// One batch cycle against an explicit clock, for deterministic tests.
    pub async fn run_once_at(
        &self,
        now: DateTime<Utc>,
        shutdown: Option<&watch::Receiver<bool>>,
    ) -> Result<BatchSummary> {
        let Ok(_guard) = self.run_lock.try_lock() else {
            warn!("Batch run already in flight; skipping this trigger");
            return Ok(BatchSummary {
                skipped: true,
                ..Default::default()
            });
        };

        // Configuration problems abort the cycle for retry next schedule.
        let rules = RuleBook::new(&self.config.rules)
            .map_err(|e| anyhow::anyhow!(e))
            .context("Invalid mapping rule configuration")?;
        let premiums = PremiumBook::new(&self.config.premiums);
        let ttl = self.config.ttl();

        let mut summary = BatchSummary::default();
        let mut snapshots: Vec<IndicatorSnapshot> = Vec::new();

        for code in &self.config.indicators {
            if is_shutdown(shutdown) {
                info!("Shutdown requested; cancelling batch after {} fetch(es)", snapshots.len());
                summary.cancelled = true;
                break;
            }
            match self.fetch_with_retry(code).await {
                Ok(snapshot) => {
                    debug!("Fetched {} = {} {}", snapshot.code, snapshot.value, snapshot.unit);
                    summary.fetched.push(code.clone());
                    snapshots.push(snapshot);
                }
                Err(e) => {
                    // Per-indicator failures never abort the batch; the
                    // affected categories simply get no new rows this cycle.
                    let outcome = EngineError::IndicatorUnavailable { id: code.clone() };
                    warn!("{outcome}: {e:#}");
                    summary.failed.push(code.clone());
                }
            }
        }

        let records = generate(
            &snapshots,
            &rules,
            &premiums,
            &self.config.locations,
            now.date_naive(),
            ttl,
        );
        if !records.is_empty() {
            summary.records_written = self
                .store
                .upsert(&records)
                .await
                .context("Failed to upsert generated price records")?;
        }
        for snapshot in &snapshots {
            self.store.put_indicator(snapshot, now + ttl).await?;
        }
        summary.purged = self.store.purge_expired(now).await?;

        info!(
            "Batch cycle complete: {} indicator(s) fetched, {} failed, {} record(s) written, {} purged",
            summary.fetched.len(),
            summary.failed.len(),
            summary.records_written,
            summary.purged
        );
        Ok(summary)
    }

    async fn fetch_with_retry(&self, code: &str) -> Result<IndicatorSnapshot> {
        with_retry(
            || self.provider.fetch_indicator(code),
            self.config.fetch_retries,
            self.config.fetch_retry_delay_ms,
        )
        .await
    }

    /// Fixed-cadence loop: one cycle per tick until shutdown. Cycle errors
    /// are logged and retried at the next schedule.
    pub async fn run_scheduled(
        &self,
        every: std::time::Duration,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.run_once(Some(&shutdown)).await {
                        error!("Batch cycle aborted: {e:#}; retrying at next schedule");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Scheduler shutting down");
                        return;
                    }
                }
            }
        }
    }
}

fn is_shutdown(shutdown: Option<&watch::Receiver<bool>>) -> bool {
    shutdown.is_some_and(|rx| *rx.borrow())
}
