//! auction-lbin
//!
//! Runs one full pass over the auction house and folds it into the
//! daily/weekly lbin snapshots.

use anyhow::{Context, Result};
use auction_lbin::auction::{self, AuctionClient};
use auction_lbin::config::AppConfig;
use auction_lbin::persistence::{self, FileSnapshotStore};
use std::time::{Duration, Instant};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    if config.logging.json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load()?;
    init_tracing(&config);
    info!(config = %config, "Starting auction pass");

    let started = Instant::now();
    let client = AuctionClient::new(
        &config.api.auction_url,
        Duration::from_secs(config.api.timeout_secs),
    )?;
    let policy = config.pricing.policy();

    let mut store = FileSnapshotStore::open(&config.persistence.data_dir)?;
    let _lock = store.lock()?;

    // A failed page discards the whole pass; nothing partial is persisted.
    let (items, stats) = match auction::run_pass(&client, &policy).await {
        Ok(result) => result,
        Err(e) => {
            error!(error = %e, "Auction pass aborted, snapshots left untouched");
            return Err(e);
        }
    };

    let today = persistence::today();
    let averaged = persistence::save_pass(&mut store, items, today)
        .context("Failed to persist auction pass")?;

    info!(
        day = today,
        items = averaged.len(),
        skipped = stats.skipped(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        data_dir = %store.dir().display(),
        "Auction pass persisted"
    );
    Ok(())
}
