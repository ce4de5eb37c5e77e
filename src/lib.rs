pub mod batch;
pub mod cli;
pub mod config;
pub mod error;
pub mod generator;
pub mod indicator;
pub mod log;
pub mod mapper;
pub mod model;
pub mod premium;
pub mod providers;
pub mod resolver;
pub mod store;

use anyhow::{Result, anyhow};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info};

use crate::batch::BatchRunner;
use crate::config::AppConfig;
use crate::mapper::RuleBook;
use crate::providers::mla::MlaProvider;
use crate::resolver::PriceResolver;
use crate::store::{FjallStore, PriceStore};

/// Arguments for a price resolution request.
#[derive(Debug, Clone)]
pub struct PriceArgs {
    pub species: String,
    pub category: String,
    pub breed: Option<String>,
    pub state: Option<String>,
    pub saleyard: Option<String>,
}

/// Arguments for a standalone category-mapping request.
#[derive(Debug, Clone)]
pub struct MatchArgs {
    pub species: String,
    pub sex: String,
    pub castrated: bool,
    pub age_months: u32,
    pub weight_kg: f64,
    pub breeding_status: Option<String>,
    pub breed: Option<String>,
}

pub enum AppCommand {
    Generate,
    Price(PriceArgs),
    Match(MatchArgs),
    Watch { every_secs: Option<u64> },
    Purge,
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    info!("Saleyard price engine starting...");

    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");

    match command {
        AppCommand::Generate => {
            let runner = build_runner(&config)?;
            cli::generate::run_and_display(&runner).await
        }
        AppCommand::Price(args) => {
            let resolver = build_resolver(&config)?;
            cli::price::resolve_and_display(&resolver, &args).await
        }
        AppCommand::Match(args) => cli::descriptor::match_and_display(&config, &args),
        AppCommand::Watch { every_secs } => {
            let runner = build_runner(&config)?;
            let every = Duration::from_secs(every_secs.unwrap_or(24 * 60 * 60));

            let (shutdown_tx, shutdown_rx) = watch::channel(false);
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    let _ = shutdown_tx.send(true);
                }
            });

            info!("Scheduler running every {}s; press ctrl-c to stop", every.as_secs());
            runner.run_scheduled(every, shutdown_rx).await;
            Ok(())
        }
        AppCommand::Purge => {
            let store = open_store(&config)?;
            let purged = store.purge_expired(chrono::Utc::now()).await?;
            println!("Purged {purged} expired price row(s)");
            Ok(())
        }
    }
}

fn open_store(config: &AppConfig) -> Result<Arc<dyn PriceStore>> {
    let data_path = config.default_data_path()?;
    Ok(Arc::new(FjallStore::open(&data_path)?))
}

fn build_runner(config: &AppConfig) -> Result<BatchRunner> {
    let provider = MlaProvider::new(
        &config.provider.base_url,
        Duration::from_secs(config.fetch_timeout_secs),
    )?;
    Ok(BatchRunner::new(
        Arc::new(provider),
        open_store(config)?,
        config.clone(),
    ))
}

fn build_resolver(config: &AppConfig) -> Result<PriceResolver> {
    let rules = RuleBook::new(&config.rules).map_err(|e| anyhow!(e))?;
    Ok(PriceResolver::new(
        open_store(config)?,
        rules,
        config.regional_multipliers.clone(),
    ))
}
