//! edgecore wiring binary.
//!
//! Loads configuration, initialises the two `tracing` targets (default +
//! `"audit"`), constructs every core component, and runs the tick loop
//! against the in-tree paper execution adapter. There is no live venue
//! adapter in this crate; `EDGECORE_DRY_RUN` exists for forward
//! compatibility with one, and is asserted on here since paper mode is
//! the only mode this binary can run.

use anyhow::Result;
use dotenv::dotenv;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use edgecore::config::EngineConfig;
use edgecore::engine::{EngineStopFlag, TradingEngine};
use edgecore::execution::{PaperExecutionAdapter, PaperExecutionConfig};
use edgecore::market_data::MarketDataManager;

fn init_tracing(filter: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenv();
    let config = EngineConfig::from_env();
    init_tracing(&config.log_filter);

    info!(symbols = ?config.symbols, dry_run = config.dry_run, "edgecore_starting");

    if !config.dry_run {
        anyhow::bail!("EDGECORE_DRY_RUN=false requires a live venue adapter, which this crate does not ship");
    }

    let market_data = MarketDataManager::new(&config.symbols, config.obi_depth.max(5));
    let stop_flag = EngineStopFlag::new();

    let ctrlc_flag = stop_flag.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown_signal_received");
            ctrlc_flag.stop();
        }
    });

    let adapter = PaperExecutionAdapter::new(PaperExecutionConfig::default());
    let mut engine = TradingEngine::new(config, market_data, stop_flag);

    engine.run(&adapter, || chrono::Utc::now().timestamp_millis()).await;

    info!("edgecore_stopped");
    Ok(())
}
